use crate::graph::{Position, Side};

/// Box sizes and gaps used to place PolicyOutput satellites around their parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub policy_width: f64,
    pub policy_height: f64,
    pub output_width: f64,
    pub output_height: f64,
    /// Gap between parent border and satellite when an output declares no offset.
    pub default_gap: f64,
    pub min_gap: f64,
    pub max_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            policy_width: 200.0,
            policy_height: 100.0,
            output_width: 120.0,
            output_height: 40.0,
            default_gap: 40.0,
            min_gap: 10.0,
            max_gap: 150.0,
        }
    }
}

impl LayoutConfig {
    /// Box sizes and gaps made non-negative, with `min_gap <= max_gap`.
    pub fn normalized(self) -> Self {
        let (min_gap, max_gap) = (self.min_gap.abs(), self.max_gap.abs());
        Self {
            policy_width: self.policy_width.abs(),
            policy_height: self.policy_height.abs(),
            output_width: self.output_width.abs(),
            output_height: self.output_height.abs(),
            default_gap: self.default_gap.abs(),
            min_gap: min_gap.min(max_gap),
            max_gap: min_gap.max(max_gap),
        }
    }

    /// Relative position of the `index`-th of `count` satellites on `side`, spaced evenly
    /// along that side and pushed out from the border by `offset` (or the default gap).
    pub fn output_position(&self, side: Side, index: usize, count: usize, offset: Option<f64>) -> Position {
        let gap = offset.unwrap_or(self.default_gap);
        let fraction = (index + 1) as f64 / (count.max(1) + 1) as f64;

        match side {
            Side::Right => Position::new(
                self.policy_width + gap,
                fraction * self.policy_height - self.output_height / 2.0,
            ),
            Side::Left => Position::new(
                -gap - self.output_width,
                fraction * self.policy_height - self.output_height / 2.0,
            ),
            Side::Top => Position::new(
                fraction * self.policy_width - self.output_width / 2.0,
                -gap - self.output_height,
            ),
            Side::Bottom => Position::new(
                fraction * self.policy_width - self.output_width / 2.0,
                self.policy_height + gap,
            ),
        }
    }

    /// Snaps a satellite's relative position onto the nearest side of the parent box.
    ///
    /// The gap to the border is clamped to `[min_gap, max_gap]` and the satellite's centre
    /// stays within the extent of that side.
    pub fn clamp_to_parent(&self, relative: Position) -> (Side, Position) {
        let (w, h) = (self.policy_width, self.policy_height);
        let (ow, oh) = (self.output_width, self.output_height);
        let centre = relative.offset(ow / 2.0, oh / 2.0);

        // How far the centre sticks out past each border; the largest wins.
        let side = [
            (Side::Right, centre.x - w),
            (Side::Left, -centre.x),
            (Side::Top, -centre.y),
            (Side::Bottom, centre.y - h),
        ]
        .into_iter()
        .fold((Side::Right, f64::NEG_INFINITY), |best, candidate| {
            if candidate.1 > best.1 { candidate } else { best }
        })
        .0;

        let clamp_gap = |gap: f64| bound(gap, self.min_gap, self.max_gap);
        let along_y = bound(relative.y, -oh / 2.0, h - oh / 2.0);
        let along_x = bound(relative.x, -ow / 2.0, w - ow / 2.0);

        let clamped = match side {
            Side::Right => Position::new(w + clamp_gap(relative.x - w), along_y),
            Side::Left => Position::new(-clamp_gap(-(relative.x + ow)) - ow, along_y),
            Side::Top => Position::new(along_x, -clamp_gap(-(relative.y + oh)) - oh),
            Side::Bottom => Position::new(along_x, h + clamp_gap(relative.y - h)),
        };
        (side, clamped)
    }
}

/// Like `f64::clamp`, but an inverted range resolves to `max` instead of panicking.
fn bound(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}
