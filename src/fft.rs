use num::{Complex, Zero};

use rustfft::{FftDirection, FftNum, FftPlanner};

use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Axis};

/// Swaps quadrants so that element `(h/2, w/2)` moves to `(0, 0)`. Both sides must be even.
pub fn fftshift2<T>(in_data: ArrayView2<T>) -> Array2<T>
where
    T: Copy,
{
    let h = in_data.shape()[0];
    let w = in_data.shape()[1];
    assert!(h % 2 == 0 && w % 2 == 0);
    let mut result = in_data.to_owned();

    result
        .slice_mut(s![0..h / 2, 0..w / 2])
        .assign(&in_data.slice(s![h / 2..h, w / 2..w]));
    result
        .slice_mut(s![0..h / 2, w / 2..w])
        .assign(&in_data.slice(s![h / 2..h, 0..w / 2]));

    result
        .slice_mut(s![h / 2..h, 0..w / 2])
        .assign(&in_data.slice(s![0..h / 2, w / 2..w]));
    result
        .slice_mut(s![h / 2..h, w / 2..w])
        .assign(&in_data.slice(s![0..h / 2, 0..w / 2]));
    result
}

fn _fft_axis<T: FftNum>(
    data: &mut ArrayViewMut2<Complex<T>>,
    axis: usize,
    direction: FftDirection,
    planner: &mut FftPlanner<T>,
) {
    let len = data.len_of(Axis(axis));
    let fft = planner.plan_fft(len, direction);
    let mut buffer = vec![Complex::zero(); len];
    let mut scratch = vec![Complex::zero(); fft.get_inplace_scratch_len()];
    for mut lane in data.lanes_mut(Axis(axis)) {
        buffer
            .iter_mut()
            .zip(lane.iter())
            .for_each(|(b, &x)| *b = x);
        fft.process_with_scratch(&mut buffer, &mut scratch);
        lane.iter_mut()
            .zip(buffer.iter())
            .for_each(|(x, &b)| *x = b);
    }
}

fn _fft2<T: FftNum>(mut data: ArrayViewMut2<Complex<T>>, direction: FftDirection) {
    let mut planner = FftPlanner::new();
    for axis in [0, 1] {
        _fft_axis(&mut data, axis, direction, &mut planner);
    }
}

/// In-place forward 2-D transform, unnormalized.
pub fn fft2<T: FftNum>(data: ArrayViewMut2<Complex<T>>) {
    _fft2(data, FftDirection::Forward);
}

/// In-place inverse 2-D transform, scaled by `1/(h*w)` so that `ifft2(fft2(x)) == x`.
pub fn ifft2<T: FftNum>(mut data: ArrayViewMut2<Complex<T>>) {
    let n = T::from_usize(data.len()).unwrap_or_else(T::one);
    _fft2(data.view_mut(), FftDirection::Inverse);
    data.mapv_inplace(|x| x.unscale(n));
}
