use crate::error::ResizeError;
use crate::profile::{Profile, TransformMode};

/// Size labels, matched to target widths by position
pub const SIZE_LABELS: [&str; 6] = ["1_6", "1_4", "1_3", "1_2", "2_3", "1"];

/// Intrinsic dimensions of a source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceDimensions {
    pub width: u32,
    pub height: u32,
}

impl SourceDimensions {
    /// Both sides must be non-zero for the aspect ratio to exist
    pub fn new(width: u32, height: u32) -> Result<Self, ResizeError> {
        if width == 0 || height == 0 {
            return Err(ResizeError::Decode(format!(
                "image has zero-sized dimensions ({width}x{height})"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// One derivative to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Ordered derivatives for one source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeSet {
    targets: Vec<TargetSize>,
}

impl SizeSet {
    pub fn targets(&self) -> &[TargetSize] {
        &self.targets
    }

    pub fn widths(&self) -> Vec<u32> {
        self.targets.iter().map(|t| t.width).collect()
    }

    pub fn heights(&self) -> Vec<u32> {
        self.targets.iter().map(|t| t.height).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Round a computed side length to whole pixels, keeping it at least 1px
fn to_pixels(value: f64, label: &str) -> Result<u32, ResizeError> {
    let rounded = value.round();
    if rounded > u32::MAX as f64 {
        return Err(ResizeError::Transform(format!(
            "derived dimension {rounded} for {label} does not fit in 32 bits"
        )));
    }
    // Degenerate sources can round to zero
    Ok((rounded as u32).max(1))
}

/// Target widths for a source width, in output order.
///
/// The `sizes` list is not guaranteed ascending: the 2/3 entry is derived
/// from the rounded 1/3 entry.
fn target_widths(width: u32, mode: TransformMode) -> Vec<f64> {
    let w = width as f64;

    match mode {
        TransformMode::Responsive => vec![w, w * 1.5, w * 2.0, w * 3.0],
        TransformMode::Sizes => vec![
            w / 6.0,
            w / 4.0,
            w / 3.0,
            w / 2.0,
            (w / 3.0).round() * 2.0,
            w,
        ],
    }
}

/// Compute the size set for a source image under a profile.
///
/// Widths scale from the source width; `max_width` only matters as the
/// denominator of the fixed height ratio when `max_height` is set. Fails
/// with `Transform` when a derived side does not fit in `u32`, which a
/// crafted header can cause in `responsive` mode.
pub fn compute_sizes(source: SourceDimensions, profile: &Profile) -> Result<SizeSet, ResizeError> {
    let aspect_ratio = source.aspect_ratio();

    let targets = target_widths(source.width, profile.transform_mode)
        .into_iter()
        .zip(SIZE_LABELS)
        .map(|(width, label)| {
            let width = to_pixels(width, label)?;
            let height = match profile.max_height {
                None => width as f64 / aspect_ratio,
                Some(max_height) => width as f64 * (max_height as f64 / profile.max_width as f64),
            };

            Ok(TargetSize {
                label,
                width,
                height: to_pixels(height, label)?,
            })
        })
        .collect::<Result<Vec<_>, ResizeError>>()?;

    Ok(SizeSet { targets })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(mode: TransformMode, max_height: Option<u32>) -> Profile {
        Profile {
            max_width: 800,
            max_height,
            output_dir: "resized".to_string(),
            transform_mode: mode,
        }
    }

    #[test]
    fn test_sizes_mode_uses_aspect_ratio() {
        let source = SourceDimensions::new(1200, 800).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Sizes, None)).unwrap();

        assert_eq!(set.widths(), vec![200, 300, 400, 600, 800, 1200]);
        assert_eq!(set.heights(), vec![133, 200, 267, 400, 533, 800]);
        let labels: Vec<_> = set.targets().iter().map(|t| t.label).collect();
        assert_eq!(labels, SIZE_LABELS.to_vec());
    }

    #[test]
    fn test_sizes_mode_ignores_max_width_as_cap() {
        // max_width is 800, but the largest output keeps the source width
        let source = SourceDimensions::new(3000, 2000).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Sizes, None)).unwrap();

        assert_eq!(set.widths().last(), Some(&3000));
    }

    #[test]
    fn test_sizes_mode_keeps_insertion_order() {
        // 1000/3 rounds to 333, so the 2/3 entry is 666 rather than 667
        let source = SourceDimensions::new(1000, 1000).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Sizes, None)).unwrap();

        assert_eq!(set.widths(), vec![167, 250, 333, 500, 666, 1000]);
    }

    #[test]
    fn test_responsive_mode() {
        let source = SourceDimensions::new(300, 200).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Responsive, None)).unwrap();

        assert_eq!(set.widths(), vec![300, 450, 600, 900]);
        assert_eq!(set.heights(), vec![200, 300, 400, 600]);
    }

    #[test]
    fn test_responsive_mode_truncates_labels() {
        let source = SourceDimensions::new(300, 200).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Responsive, None)).unwrap();

        let labels: Vec<_> = set.targets().iter().map(|t| t.label).collect();
        assert_eq!(labels, vec!["1_6", "1_4", "1_3", "1_2"]);
    }

    #[test]
    fn test_fixed_height_ratio() {
        let source = SourceDimensions::new(1200, 800).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Sizes, Some(400))).unwrap();

        // 400 / 800 = 0.5 regardless of the source aspect ratio
        assert_eq!(set.targets()[0].width, 200);
        assert_eq!(set.targets()[0].height, 100);
        assert_eq!(set.heights(), vec![100, 150, 200, 300, 400, 600]);
    }

    #[test]
    fn test_tiny_source_stays_positive() {
        let source = SourceDimensions::new(2, 1).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Sizes, None)).unwrap();

        assert!(set.targets().iter().all(|t| t.width >= 1 && t.height >= 1));
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn test_oversized_header_is_rejected_without_overflow() {
        let source = SourceDimensions::new(2_000_000_000, 1).unwrap();

        let result = compute_sizes(source, &profile(TransformMode::Responsive, None));
        assert!(matches!(result, Err(ResizeError::Transform(_))));

        // The same width still fits when only scaled down
        let set = compute_sizes(source, &profile(TransformMode::Sizes, None)).unwrap();
        assert_eq!(set.widths().last(), Some(&2_000_000_000));
    }

    #[test]
    fn test_largest_width_that_fits_responsive_mode() {
        let source = SourceDimensions::new(u32::MAX / 3, 1).unwrap();
        let set = compute_sizes(source, &profile(TransformMode::Responsive, None)).unwrap();

        assert_eq!(set.widths()[3], u32::MAX / 3 * 3);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            SourceDimensions::new(100, 0),
            Err(ResizeError::Decode(_))
        ));
        assert!(SourceDimensions::new(0, 100).is_err());
    }
}
