use std::sync::Arc;

use super::*;

fn solid_image(px: [u8; 4], width: u32, height: u32) -> PreparedImage {
    PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(px.repeat((width * height) as usize)),
    }
}

#[test]
fn surface_starts_transparent_and_accumulates_draws() {
    let canvas = Canvas { width: 2, height: 1 };
    let mut surface = Surface::new(canvas).unwrap();
    assert!(surface.frame().data.iter().all(|&b| b == 0));
    assert!(surface.frame().premultiplied);

    surface.draw_image(&solid_image([200, 0, 0, 255], 2, 1), 1.0).unwrap();
    surface.draw_rgba(&[0, 0, 200, 255].repeat(2), 0.5).unwrap();
    let px = &surface.frame().data[..4];
    assert_eq!(px[3], 255);
    assert!(px[0] > 90 && px[0] < 110, "{px:?}");
    assert!(px[2] > 90 && px[2] < 110, "{px:?}");
}

#[test]
fn surface_rejects_zero_size_and_mismatched_images() {
    assert!(matches!(
        Surface::new(Canvas { width: 0, height: 4 }),
        Err(DoodleError::Validation(_))
    ));
    let mut surface = Surface::new(Canvas { width: 2, height: 2 }).unwrap();
    assert!(surface.draw_image(&solid_image([1, 2, 3, 255], 3, 2), 1.0).is_err());
    assert!(surface.draw_rgba(&[0u8; 4], 1.0).is_err());
}
