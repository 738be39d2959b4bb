//! Width thresholds at which responsive layouts switch regime.

use serde::{Deserialize, Serialize};

/// A slide-width class. Derived from the actual slide width unless the
/// caller pins one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Breakpoint {
    Xs,
    Sm,
    Md,
    Lg,
    Xl,
}

impl Breakpoint {
    pub fn from_width(width: f64) -> Self {
        match width {
            w if w < 480.0 => Self::Xs,
            w if w < 720.0 => Self::Sm,
            w if w < 960.0 => Self::Md,
            w if w < 1280.0 => Self::Lg,
            _ => Self::Xl,
        }
    }

    /// Collapses a declared column count: `xs` stacks everything, `sm` keeps
    /// at most two columns.
    pub fn adapt_columns(&self, declared: usize) -> usize {
        match self {
            Self::Xs => 1,
            Self::Sm => declared.min(2),
            _ => declared,
        }
    }

    /// The factor applied to the responsive font baseline.
    pub fn font_scale(&self) -> f64 {
        match self {
            Self::Xs => 0.85,
            Self::Sm => 0.9,
            Self::Md => 1.0,
            Self::Lg => 1.05,
            Self::Xl => 1.1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, Breakpoint::Xs)]
    #[case(479.9, Breakpoint::Xs)]
    #[case(480.0, Breakpoint::Sm)]
    #[case(719.9, Breakpoint::Sm)]
    #[case(720.0, Breakpoint::Md)]
    #[case(960.0, Breakpoint::Lg)]
    #[case(1279.9, Breakpoint::Lg)]
    #[case(1280.0, Breakpoint::Xl)]
    #[case(4000.0, Breakpoint::Xl)]
    fn width_classification(#[case] width: f64, #[case] expected: Breakpoint) {
        assert_eq!(Breakpoint::from_width(width), expected);
    }

    #[rstest]
    #[case(Breakpoint::Xs, 3, 1)]
    #[case(Breakpoint::Sm, 3, 2)]
    #[case(Breakpoint::Sm, 1, 1)]
    #[case(Breakpoint::Md, 3, 3)]
    #[case(Breakpoint::Xl, 4, 4)]
    fn column_collapse(#[case] breakpoint: Breakpoint, #[case] declared: usize, #[case] expected: usize) {
        assert_eq!(breakpoint.adapt_columns(declared), expected);
    }

    #[test]
    fn font_scale_grows_with_width() {
        let scales: Vec<_> = [Breakpoint::Xs, Breakpoint::Sm, Breakpoint::Md, Breakpoint::Lg, Breakpoint::Xl]
            .iter()
            .map(|b| b.font_scale())
            .collect();
        assert!(scales.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
