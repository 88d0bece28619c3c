//! Metrics recovered from what the delegated program reports about itself.
//!
//! Nothing here is estimated: if the program does not print a value, the
//! corresponding metric stays `None`.

const DURATION_MARKER: &str = "Duration:";
const CONFIDENCE_MARKER: &str = "Confidence:";

/// Media duration in seconds from a stdout line such as
/// `[TIME] Duration: 4:05 minutes`. The last such line wins.
pub fn parse_duration(stdout: &str) -> Option<u64> {
    stdout.lines().rev().find_map(|line| {
        let (_, rest) = line.split_once(DURATION_MARKER)?;
        let clock = rest.split_whitespace().next()?;
        clock_to_seconds(clock)
    })
}

// "M:SS", "H:MM:SS" or plain seconds.
fn clock_to_seconds(clock: &str) -> Option<u64> {
    clock.split(':').try_fold(0u64, |total, part| {
        let value: u64 = part.parse().ok()?;
        total.checked_mul(60)?.checked_add(value)
    })
}

/// Mean of the per-segment `Confidence: 93.41%` lines in a transcript file,
/// rounded to a whole percentage. Zero confidences are not counted.
pub fn average_confidence(transcript: &str) -> Option<u8> {
    let values: Vec<f64> = transcript
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(CONFIDENCE_MARKER))
        .filter_map(|value| value.trim().trim_end_matches('%').trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .collect();

    if values.is_empty() {
        return None;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(mean.round().clamp(0.0, 100.0) as u8)
}
