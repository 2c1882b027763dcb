use common::utils::log_entry::detection::DetectionEntry;

pub const MINIMUM_CONFIDENCE_PERCENT: u8 = 25;
pub const MAXIMUM_CONFIDENCE_PERCENT: u8 = 100;
pub const DEFAULT_CONFIDENCE_PERCENT: u8 = 60;

///Slider position mapped to the fraction handed to the model.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConfidenceThreshold(f32);

impl ConfidenceThreshold {
    pub fn from_percent(percent: u8) -> Result<Self, String> {
        if !(MINIMUM_CONFIDENCE_PERCENT..=MAXIMUM_CONFIDENCE_PERCENT).contains(&percent) {
            return Err(DetectionEntry::ConfidenceOutOfRange(percent).into());
        }
        Ok(Self(percent as f32 / 100.0))
    }

    pub fn fraction(&self) -> f32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_slider_position_maps_to_percent_over_one_hundred() {
        for percent in MINIMUM_CONFIDENCE_PERCENT..=MAXIMUM_CONFIDENCE_PERCENT {
            let threshold = ConfidenceThreshold::from_percent(percent)
                .unwrap_or_else(|err| panic!("{percent} rejected: {err}"));
            assert_eq!(threshold.fraction(), percent as f32 / 100.0);
            assert!((0.25..=1.0).contains(&threshold.fraction()));
        }
    }

    #[test]
    fn default_slider_position_is_sixty_percent() {
        let threshold = ConfidenceThreshold::from_percent(DEFAULT_CONFIDENCE_PERCENT).unwrap();
        assert_eq!(threshold.fraction(), 0.60);
    }

    #[test]
    fn out_of_range_positions_are_rejected() {
        assert!(ConfidenceThreshold::from_percent(0).is_err());
        assert!(ConfidenceThreshold::from_percent(24).is_err());
        assert!(ConfidenceThreshold::from_percent(101).is_err());
        assert!(ConfidenceThreshold::from_percent(255).is_err());
    }
}
