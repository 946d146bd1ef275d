//! Key signature inference from projection peaks
//!
//! Sharps show two stems each, flats one. Stems of a same sharp are closer to each
//! other than stems of two consecutive flats, so the mean of the short peak intervals
//! separates the two cases. When that mean is ambiguous, the left side of the first
//! peak decides: a flat stem starts its glyph, while sharp bars extend left of the
//! first sharp stem.

use crate::analysis::result::Shape;
use crate::config::KeyParameters;
use crate::features::peak_picking::Peak;
use crate::sheet::staff::KeyRange;

/// Inferred signature: -flats, 0 or +sharps, with the key shape when not 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Signed alteration count
    pub value: i32,
    /// Alteration shape, `None` when value is 0
    pub shape: Option<Shape>,
}

impl Signature {
    /// No key signature
    pub const NONE: Signature = Signature {
        value: 0,
        shape: None,
    };
}

/// Infer the signature from the accepted peaks
///
/// The mean interval between peak centers is computed first, then only the intervals at
/// or below that mean ("short" intervals) are averaged. A trailing invalid peak is
/// ignored, unless it is the only one. For sharps, an odd number of valid peaks leads
/// the last valid peak to be marked invalid.
///
/// # Arguments
///
/// * `peaks` - Accepted peaks, only the last one may be invalid (may get modified)
/// * `area_start` - Key area start abscissa
/// * `params` - Scale-dependent thresholds
pub fn infer_signature(peaks: &mut Vec<Peak>, area_start: i32, params: &KeyParameters) -> Signature {
    if peaks.is_empty() {
        return Signature::NONE;
    }

    let mut last = peaks.len() - 1;

    if peaks[last].invalid {
        if last > 0 {
            last -= 1;
        } else {
            log::debug!("No valid peak");
            return Signature::NONE;
        }
    }

    if last == 0 {
        return Signature {
            value: -1,
            shape: Some(Shape::Flat),
        };
    }

    let mean_dx = (peaks[last].center() - peaks[0].center()) / last as f64;
    let shorts: Vec<f64> = (1..=last)
        .map(|i| peaks[i].center() - peaks[i - 1].center())
        .filter(|&dx| dx <= mean_dx)
        .collect();
    let mean_short = if shorts.is_empty() {
        mean_dx
    } else {
        shorts.iter().sum::<f64>() / shorts.len() as f64
    };
    let offset = (peaks[0].start - area_start) as f64;

    let shape = if mean_short < params.min_flat_delta {
        Shape::Sharp
    } else if mean_short > params.max_sharp_delta {
        Shape::Flat
    } else if offset > params.offset_threshold {
        Shape::Sharp
    } else {
        Shape::Flat
    };

    log::debug!(
        "Peaks: {} valid, mean dx {:.1}, mean short {:.1}, offset {} -> {:?}",
        last + 1,
        mean_dx,
        mean_short,
        offset,
        shape
    );

    match shape {
        Shape::Sharp => {
            // Two stems per sharp
            if (last + 1) % 2 != 0 {
                if peaks[peaks.len() - 1].invalid {
                    peaks.pop();
                }

                if let Some(peak) = peaks.last_mut() {
                    peak.invalid = true;
                }

                last -= 1;
            }

            Signature {
                value: ((last + 1) / 2) as i32,
                shape: Some(Shape::Sharp),
            }
        }
        _ => Signature {
            value: -((last + 1) as i32),
            shape: Some(Shape::Flat),
        },
    }
}

/// Check the trailing peak, which may reduce the signature magnitude
///
/// When the last peak is invalid, the key area stops right before it. If the room left
/// after the last valid peak is too narrow for the current shape, the last item is not
/// considered genuine.
pub fn check_signature(
    signature: Signature,
    peaks: &[Peak],
    range: &mut KeyRange,
    params: &KeyParameters,
) -> Signature {
    let (last_peak, good_peak) = match (peaks.last(), last_good_peak(peaks)) {
        (Some(last), Some(good)) => (last, good),
        _ => return signature,
    };

    if !last_peak.invalid {
        return signature;
    }

    let stop = last_peak.start - 1;
    range.stop = Some(stop);
    let trail = stop - good_peak.start + 1;

    let mut checked = signature;

    if signature.value < 0 {
        if trail < params.min_flat_trail {
            log::debug!("Removing too narrow flat, trail {}", trail);
            checked.value += 1;
        }
    } else if signature.value > 0 && trail < params.min_sharp_trail {
        log::debug!("Removing too narrow sharp, trail {}", trail);
        checked.value -= 1;
    }

    if checked.value == 0 {
        checked.shape = None;
    }

    checked
}

/// Last peak before the first invalid one, if any
pub fn last_good_peak(peaks: &[Peak]) -> Option<&Peak> {
    peaks.iter().take_while(|p| !p.invalid).last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyConfig;
    use crate::sheet::Scale;

    fn params() -> KeyParameters {
        KeyParameters::new(&KeyConfig::default(), &Scale::new(20, 2).unwrap())
    }

    fn peaks_at(starts: &[i32]) -> Vec<Peak> {
        starts.iter().map(|&s| Peak::new(s, s + 1, 50)).collect()
    }

    #[test]
    fn test_empty_peaks() {
        let mut peaks = vec![];
        assert_eq!(infer_signature(&mut peaks, 0, &params()), Signature::NONE);
    }

    #[test]
    fn test_single_invalid_peak() {
        let mut peaks = peaks_at(&[10]);
        peaks[0].invalid = true;
        assert_eq!(infer_signature(&mut peaks, 0, &params()), Signature::NONE);
    }

    #[test]
    fn test_single_peak_is_one_flat() {
        let mut peaks = peaks_at(&[10]);
        let sig = infer_signature(&mut peaks, 10, &params());
        assert_eq!(sig.value, -1);
        assert_eq!(sig.shape, Some(Shape::Flat));
    }

    #[test]
    fn test_one_sharp() {
        // Two stems 8 pixels apart (< min_flat_delta = 10)
        let mut peaks = peaks_at(&[24, 32]);
        let sig = infer_signature(&mut peaks, 20, &params());
        assert_eq!(sig.value, 1);
        assert_eq!(sig.shape, Some(Shape::Sharp));
    }

    #[test]
    fn test_three_flats() {
        // Stems 18 pixels apart (> max_sharp_delta = 15)
        let mut peaks = peaks_at(&[20, 38, 56]);
        let sig = infer_signature(&mut peaks, 20, &params());
        assert_eq!(sig.value, -3);
        assert_eq!(sig.shape, Some(Shape::Flat));
    }

    #[test]
    fn test_ambiguous_spacing_uses_offset() {
        // Short deltas of 12: between min_flat_delta and max_sharp_delta
        let mut peaks = peaks_at(&[24, 36]);
        let sharp = infer_signature(&mut peaks, 20, &params());
        assert_eq!(sharp.shape, Some(Shape::Sharp));

        let mut peaks = peaks_at(&[24, 36]);
        let flat = infer_signature(&mut peaks, 23, &params());
        assert_eq!(flat.shape, Some(Shape::Flat));
        assert_eq!(flat.value, -2);
    }

    #[test]
    fn test_odd_sharp_peaks_demote_last() {
        let mut peaks = peaks_at(&[24, 32, 46, 54, 68]);
        let sig = infer_signature(&mut peaks, 20, &params());
        assert_eq!(sig.value, 2);
        assert_eq!(peaks.len(), 5);
        assert!(peaks[4].invalid);
        assert!(peaks[..4].iter().all(|p| !p.invalid));
    }

    #[test]
    fn test_odd_sharp_peaks_with_trailing_invalid() {
        let mut peaks = peaks_at(&[24, 32, 46, 54, 68, 90]);
        peaks[5].invalid = true;
        let sig = infer_signature(&mut peaks, 20, &params());
        assert_eq!(sig.value, 2);
        assert_eq!(peaks.len(), 5);
        assert!(peaks[4].invalid);
    }

    #[test]
    fn test_trailing_invalid_peak_ignored_for_flats() {
        let mut peaks = peaks_at(&[20, 38, 56, 90]);
        peaks[3].invalid = true;
        let sig = infer_signature(&mut peaks, 20, &params());
        assert_eq!(sig.value, -3);
    }

    #[test]
    fn test_check_signature_narrow_flat_removed() {
        let mut peaks = peaks_at(&[20, 38, 56, 66]);
        peaks[3].invalid = true;
        let mut range = KeyRange::new(0, 200);
        let sig = Signature {
            value: -3,
            shape: Some(Shape::Flat),
        };
        // trail = 65 - 56 + 1 = 10 < min_flat_trail (16)
        let checked = check_signature(sig, &peaks, &mut range, &params());
        assert_eq!(checked.value, -2);
        assert_eq!(range.stop, Some(65));
    }

    #[test]
    fn test_check_signature_wide_sharp_kept() {
        let mut peaks = peaks_at(&[24, 32, 46, 54, 68]);
        peaks[4].invalid = true;
        let mut range = KeyRange::new(0, 200);
        let sig = Signature {
            value: 2,
            shape: Some(Shape::Sharp),
        };
        let checked = check_signature(sig, &peaks, &mut range, &params());
        assert_eq!(checked.value, 2);
        assert_eq!(range.stop, Some(67));
    }

    #[test]
    fn test_check_signature_without_invalid_peak() {
        let peaks = peaks_at(&[24, 32]);
        let mut range = KeyRange::new(0, 200);
        let sig = Signature {
            value: 1,
            shape: Some(Shape::Sharp),
        };
        assert_eq!(check_signature(sig, &peaks, &mut range, &params()), sig);
        assert_eq!(range.stop, None);
    }

    #[test]
    fn test_last_good_peak() {
        let mut peaks = peaks_at(&[10, 20, 30]);
        assert_eq!(last_good_peak(&peaks).map(|p| p.start), Some(30));
        peaks[1].invalid = true;
        assert_eq!(last_good_peak(&peaks).map(|p| p.start), Some(10));
        peaks[0].invalid = true;
        assert!(last_good_peak(&peaks).is_none());
    }
}
