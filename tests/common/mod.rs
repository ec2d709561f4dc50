use ndarray::Array2;
use polymask::RasterMask;

/// Mask of `height` x `width` with the given `(x0, y0, x1, y1)` rectangles set.
pub fn mask_with(
    height: usize,
    width: usize,
    rects: &[(usize, usize, usize, usize)],
) -> RasterMask {
    let mut data = Array2::<u8>::zeros((height, width));
    for &(x0, y0, x1, y1) in rects {
        for y in y0..y1 {
            for x in x0..x1 {
                data[[y, x]] = 255;
            }
        }
    }
    RasterMask::new(data)
}

/// Clear the `(x0, y0, x1, y1)` rectangle.
pub fn punch(mask: RasterMask, x0: usize, y0: usize, x1: usize, y1: usize) -> RasterMask {
    let mut data = mask.into_array();
    for y in y0..y1 {
        for x in x0..x1 {
            data[[y, x]] = 0;
        }
    }
    RasterMask::new(data)
}
