//! Projective warps and orientation helpers.
//!
//! This module solves the homography between two quadrilaterals and resamples
//! an image through it with bicubic interpolation.

use crate::core::errors::ImageProcessError;
use crate::processors::geometry::Point;
use image::{Rgb, RgbImage, imageops};
use nalgebra::{DMatrix, DVector, Matrix3, RowDVector, Vector3};
use rayon::prelude::*;
use tracing::debug;

/// Calculates the perspective transformation matrix that maps source points to destination points.
///
/// The eight unknowns of the homography (with `h33 = 1`) are found by solving
/// the 8x8 linear system given by the four point correspondences.
///
/// # Errors
///
/// Returns [`ImageProcessError::DegenerateTransform`] when the system is
/// singular, e.g. when three source points are collinear.
pub fn perspective_transform(
    src_points: &[Point; 4],
    dst_points: &[Point; 4],
) -> Result<Matrix3<f64>, ImageProcessError> {
    if has_collinear_triple(src_points) || has_collinear_triple(dst_points) {
        return Err(ImageProcessError::DegenerateTransform);
    }

    let mut a = DMatrix::<f64>::zeros(8, 8);
    let mut b = DVector::<f64>::zeros(8);

    for (i, (src, dst)) in src_points.iter().zip(dst_points).enumerate() {
        let (sx, sy) = (src.x as f64, src.y as f64);
        let (dx, dy) = (dst.x as f64, dst.y as f64);

        a.set_row(
            i * 2,
            &RowDVector::from_row_slice(&[sx, sy, 1.0, 0.0, 0.0, 0.0, -sx * dx, -sy * dx]),
        );
        b[i * 2] = dx;

        a.set_row(
            i * 2 + 1,
            &RowDVector::from_row_slice(&[0.0, 0.0, 0.0, sx, sy, 1.0, -sx * dy, -sy * dy]),
        );
        b[i * 2 + 1] = dy;
    }

    let solution = a
        .lu()
        .solve(&b)
        .ok_or(ImageProcessError::DegenerateTransform)?;

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(ImageProcessError::DegenerateTransform);
    }

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}

/// A homography is only defined when no three of the four points are collinear.
fn has_collinear_triple(points: &[Point; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(i, j, k)| {
        let (a, b, c) = (points[i], points[j], points[k]);
        let cross = (b.x as f64 - a.x as f64) * (c.y as f64 - a.y as f64)
            - (b.y as f64 - a.y as f64) * (c.x as f64 - a.x as f64);
        cross.abs() < 1e-9
    })
}

/// Applies a perspective transformation to an image.
///
/// Every destination pixel is mapped back through the inverse transform and
/// sampled bicubically; samples falling outside the source replicate the
/// nearest border pixel. Rows are processed in parallel.
pub fn warp_perspective(
    src_image: &RgbImage,
    transform_matrix: &Matrix3<f64>,
    dst_width: u32,
    dst_height: u32,
) -> Result<RgbImage, ImageProcessError> {
    if dst_width == 0 || dst_height == 0 || src_image.width() == 0 || src_image.height() == 0 {
        return Err(ImageProcessError::InvalidOutputSize {
            width: dst_width,
            height: dst_height,
        });
    }

    let inv_matrix = transform_matrix
        .try_inverse()
        .ok_or(ImageProcessError::DegenerateTransform)?;

    let mut dst_image = RgbImage::new(dst_width, dst_height);
    let buffer: &mut [u8] = dst_image.as_mut();

    buffer
        .par_chunks_mut((dst_width * 3) as usize)
        .enumerate()
        .for_each(|(dst_y, row_buffer)| {
            for dst_x in 0..dst_width {
                let src_point = inv_matrix * Vector3::new(dst_x as f64, dst_y as f64, 1.0);
                let pixel = if src_point.z.abs() > f64::EPSILON {
                    bicubic_interpolate(
                        src_image,
                        (src_point.x / src_point.z) as f32,
                        (src_point.y / src_point.z) as f32,
                    )
                } else {
                    *src_image.get_pixel(0, 0)
                };
                let index = (dst_x * 3) as usize;
                row_buffer[index..index + 3].copy_from_slice(&pixel.0);
            }
        });

    Ok(dst_image)
}

/// Rotates landscape images 90 degrees clockwise; portrait and square images
/// are returned unchanged.
pub fn to_portrait(image: &RgbImage) -> RgbImage {
    if image.width() > image.height() {
        debug!(
            width = image.width(),
            height = image.height(),
            "Rotating landscape image to portrait"
        );
        imageops::rotate90(image)
    } else {
        image.clone()
    }
}

#[inline]
fn get_pixel_replicate(image: &RgbImage, x: i32, y: i32) -> Rgb<u8> {
    let clamped_x = x.clamp(0, image.width() as i32 - 1) as u32;
    let clamped_y = y.clamp(0, image.height() as i32 - 1) as u32;
    *image.get_pixel(clamped_x, clamped_y)
}

/// Catmull-Rom cubic convolution kernel (a = -0.5).
#[inline]
fn cubic_kernel(t: f32) -> f32 {
    const A: f32 = -0.5;
    let t_abs = t.abs();

    if t_abs <= 1.0 {
        (A + 2.0) * t_abs * t_abs * t_abs - (A + 3.0) * t_abs * t_abs + 1.0
    } else if t_abs < 2.0 {
        A * t_abs * t_abs * t_abs - 5.0 * A * t_abs * t_abs + 8.0 * A * t_abs - 4.0 * A
    } else {
        0.0
    }
}

fn bicubic_interpolate(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x_int = x.floor() as i32;
    let y_int = y.floor() as i32;
    let dx = x - x_int as f32;
    let dy = y - y_int as f32;

    let wx = [
        cubic_kernel(dx + 1.0),
        cubic_kernel(dx),
        cubic_kernel(dx - 1.0),
        cubic_kernel(dx - 2.0),
    ];
    let wy = [
        cubic_kernel(dy + 1.0),
        cubic_kernel(dy),
        cubic_kernel(dy - 1.0),
        cubic_kernel(dy - 2.0),
    ];

    let mut result = [0.0f32; 3];
    for (j, &weight_y) in wy.iter().enumerate() {
        let sample_y = y_int - 1 + j as i32;
        for (i, &weight_x) in wx.iter().enumerate() {
            let sample_x = x_int - 1 + i as i32;
            let weight = weight_x * weight_y;
            let pixel = get_pixel_replicate(image, sample_x, sample_y);
            for (c, result_c) in result.iter_mut().enumerate() {
                *result_c += weight * pixel.0[c] as f32;
            }
        }
    }

    Rgb(result.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(scale: f32) -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(scale, 0.0),
            Point::new(scale, scale),
            Point::new(0.0, scale),
        ]
    }

    #[test]
    fn test_perspective_transform_maps_corners() {
        let src = [
            Point::new(10.0, 12.0),
            Point::new(90.0, 5.0),
            Point::new(95.0, 70.0),
            Point::new(3.0, 60.0),
        ];
        let dst = unit_square(50.0);
        let matrix = perspective_transform(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let p = matrix * Vector3::new(s.x as f64, s.y as f64, 1.0);
            assert!((p.x / p.z - d.x as f64).abs() < 1e-6);
            assert!((p.y / p.z - d.y as f64).abs() < 1e-6);
        }
    }

    #[test]
    fn test_perspective_transform_collinear_is_degenerate() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
        ];
        assert!(perspective_transform(&src, &unit_square(1.0)).is_err());
    }

    #[test]
    fn test_identity_warp_preserves_pixels() {
        let image = RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 7]));
        let warped = warp_perspective(&image, &Matrix3::identity(), 8, 6).unwrap();
        assert_eq!(warped, image);
    }

    #[test]
    fn test_warp_singular_matrix() {
        let image = RgbImage::new(2, 2);
        let matrix = Matrix3::new(1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(matches!(
            warp_perspective(&image, &matrix, 2, 2),
            Err(ImageProcessError::DegenerateTransform)
        ));
    }

    #[test]
    fn test_warp_zero_size() {
        let image = RgbImage::new(2, 2);
        assert!(matches!(
            warp_perspective(&image, &Matrix3::identity(), 0, 2),
            Err(ImageProcessError::InvalidOutputSize { .. })
        ));
    }

    #[test]
    fn test_to_portrait() {
        let landscape = RgbImage::new(30, 10);
        assert_eq!(to_portrait(&landscape).dimensions(), (10, 30));
        let portrait = RgbImage::new(10, 30);
        assert_eq!(to_portrait(&portrait).dimensions(), (10, 30));
        let square = RgbImage::new(12, 12);
        assert_eq!(to_portrait(&square).dimensions(), (12, 12));
    }

    #[test]
    fn test_cubic_kernel_interpolates() {
        assert_eq!(cubic_kernel(0.0), 1.0);
        assert_eq!(cubic_kernel(1.0), 0.0);
        assert_eq!(cubic_kernel(2.5), 0.0);
    }
}
