/// Index-based decimation: keeps every `ceil(len / max_points)`-th element
/// starting at index 0. Short series come back unchanged; order is preserved.
pub fn downsample<T: Clone>(series: &[T], max_points: usize) -> Vec<T> {
    if max_points == 0 {
        return Vec::new();
    }
    if series.len() <= max_points {
        return series.to_vec();
    }
    let stride = series.len().div_ceil(max_points);
    series.iter().step_by(stride).cloned().collect()
}
