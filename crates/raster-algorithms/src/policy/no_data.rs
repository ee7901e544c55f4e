//! No-data detection and marking.

use partitioned_array::Element;

/// How an algorithm recognises missing input values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputNoDataPolicy<T> {
    /// Inputs never contain no-data.
    SkipNoData,
    /// Values equal to the sentinel are no-data. A NaN sentinel matches
    /// every NaN.
    DetectNoDataByValue(T),
}

impl<T: Element> InputNoDataPolicy<T> {
    #[inline]
    pub fn is_no_data(&self, value: &T) -> bool {
        match self {
            Self::SkipNoData => false,
            Self::DetectNoDataByValue(no_data) => value.same_value(no_data),
        }
    }
}

/// How an algorithm writes missing output values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputNoDataPolicy<T> {
    /// Outputs are never marked; cells keep their initial value.
    DontMarkNoData,
    /// Missing cells are set to the sentinel.
    MarkNoDataByValue(T),
}

impl<T: Element> OutputNoDataPolicy<T> {
    #[inline]
    pub fn mark_no_data(&self, value: &mut T) {
        if let Self::MarkNoDataByValue(no_data) = self {
            *value = *no_data;
        }
    }

    /// Whether a value written under this policy represents no-data.
    #[inline]
    pub fn is_no_data(&self, value: &T) -> bool {
        match self {
            Self::DontMarkNoData => false,
            Self::MarkNoDataByValue(no_data) => value.same_value(no_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_nan() {
        let policy = InputNoDataPolicy::DetectNoDataByValue(f32::NAN);
        assert!(policy.is_no_data(&f32::NAN));
        assert!(!policy.is_no_data(&0.0));
        assert!(!InputNoDataPolicy::<f32>::SkipNoData.is_no_data(&f32::NAN));
    }

    #[test]
    fn test_mark() {
        let mut value = 3_i32;
        OutputNoDataPolicy::DontMarkNoData.mark_no_data(&mut value);
        assert_eq!(value, 3);

        let policy = OutputNoDataPolicy::MarkNoDataByValue(i32::MIN);
        policy.mark_no_data(&mut value);
        assert_eq!(value, i32::MIN);
        assert!(policy.is_no_data(&value));
    }
}
