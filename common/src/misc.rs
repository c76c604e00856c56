/// Rounds to a fixed number of decimal places. Negative zero comes back as
/// positive zero so it never reaches the output as `-0`.
pub fn round_to(value: f64, places: u32) -> f64 {
    let scale = 10_f64.powi(places as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn human_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        format!("{minutes:.0}m {:.0}s", seconds - minutes * 60.0)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds - hours * 3600.0) / 60.0).floor();
        format!("{hours:.0}h {minutes:.0}m")
    }
}
