use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "glint-demo",
    author,
    version,
    about = "Threaded egui overlay demo: worker threads feed named draw commands"
)]
pub struct Cli {
    /// Image shown on the visibility-gate button.
    #[arg(long, value_name = "PATH", default_value = "gate.png")]
    pub gate_image: PathBuf,

    /// Optional TTF/OTF font installed over the toolkit defaults.
    #[arg(long, value_name = "PATH")]
    pub font: Option<PathBuf>,

    /// Host window size (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        default_value = "800x600",
        value_parser = parse_surface_size
    )]
    pub size: (u32, u32),

    /// Host window title.
    #[arg(long, default_value = "Glint Demo")]
    pub title: String,

    /// Show the registered windows immediately instead of waiting for a
    /// gate click.
    #[arg(long)]
    pub visible: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_sizes() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert!(parse_surface_size("1280").is_err());
        assert!(parse_surface_size("0x720").is_err());
        assert!(parse_surface_size("widexhigh").is_err());
    }
}
