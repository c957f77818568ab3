use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Always-rendered control surface anchored near the bottom-right corner.
///
/// The gate presents an image button that toggles the visibility flag, and
/// its window close affordance doubles as the application's quit control:
/// once `open` drops to false the render loop clears its running flag.
/// The gate's own open state is independent of the visibility flag.
pub(crate) struct VisibilityGate {
    image_path: PathBuf,
    pub(crate) open: bool,
    texture: Option<egui::TextureHandle>,
    load_failed: bool,
}

/// What the gate observed during one frame.
pub(crate) struct GateResponse {
    /// The toggle button was activated this frame.
    pub(crate) toggled: bool,
    /// False once the close affordance has been used.
    pub(crate) open: bool,
}

impl VisibilityGate {
    pub(crate) fn new(image_path: PathBuf) -> Self {
        Self {
            image_path,
            open: true,
            texture: None,
            load_failed: false,
        }
    }

    /// Decodes the gate image on first use. Failure degrades to a text
    /// button rather than aborting the loop.
    fn ensure_texture(&mut self, ctx: &egui::Context) -> Option<&egui::TextureHandle> {
        if self.texture.is_none() && !self.load_failed {
            match load_gate_image(&self.image_path) {
                Ok(image) => {
                    info!(
                        path = %self.image_path.display(),
                        width = image.size[0],
                        height = image.size[1],
                        "loaded gate image"
                    );
                    self.texture =
                        Some(ctx.load_texture("glint-gate", image, egui::TextureOptions::LINEAR));
                }
                Err(err) => {
                    warn!(
                        path = %self.image_path.display(),
                        error = %err,
                        "failed to load gate image; falling back to a text button"
                    );
                    self.load_failed = true;
                }
            }
        }
        self.texture.as_ref()
    }

    /// Renders the gate for this frame and reports what happened.
    pub(crate) fn show(&mut self, ctx: &egui::Context) -> GateResponse {
        let texture = self
            .ensure_texture(ctx)
            .map(|texture| (texture.id(), texture.size_vec2()));

        let mut open = self.open;
        let mut toggled = false;
        egui::Window::new("glint")
            .open(&mut open)
            .anchor(egui::Align2::RIGHT_BOTTOM, [-8.0, -8.0])
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                let clicked = match texture {
                    Some((id, size)) => {
                        let image =
                            egui::Image::new(egui::load::SizedTexture::new(id, size));
                        ui.add(egui::ImageButton::new(image).frame(false)).clicked()
                    }
                    None => ui.button("toggle overlay").clicked(),
                };
                if clicked {
                    toggled = true;
                }
            });
        self.open = open;

        GateResponse { toggled, open }
    }
}

/// Decodes an image file into toolkit pixel data.
fn load_gate_image(path: &Path) -> Result<egui::ColorImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to open gate image at {}", path.display()))?;
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_an_image_into_pixel_data() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gate.png");
        let pixels = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        pixels.save(&path).expect("write fixture image");

        let decoded = load_gate_image(&path).expect("decode fixture image");
        assert_eq!(decoded.size, [3, 2]);
    }

    #[test]
    fn missing_image_is_an_error() {
        assert!(load_gate_image(Path::new("/nonexistent/gate.png")).is_err());
    }

    #[test]
    fn gate_degrades_to_text_button_and_stays_open() {
        let ctx = egui::Context::default();
        let mut gate = VisibilityGate::new(PathBuf::from("/nonexistent/gate.png"));

        let mut response = None;
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            response = Some(gate.show(ctx));
        });

        let response = response.expect("gate ran");
        assert!(response.open);
        assert!(!response.toggled);
        assert!(gate.load_failed);
        // The fallback window still produced draw data.
        assert!(!output.shapes.is_empty());
    }

    #[test]
    fn closed_gate_reports_closed_every_frame() {
        let ctx = egui::Context::default();
        let mut gate = VisibilityGate::new(PathBuf::from("/nonexistent/gate.png"));
        gate.open = false;

        let mut response = None;
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            response = Some(gate.show(ctx));
        });
        assert!(!response.expect("gate ran").open);
    }
}
