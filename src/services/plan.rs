use crate::core::story::{GenerationPlan, LengthTier};
use log::warn;

impl LengthTier {
    pub fn plan(&self) -> GenerationPlan {
        let (scene_count, target_word_count) = match self {
            LengthTier::Short => (6, 400),
            LengthTier::Medium => (8, 800),
            LengthTier::Long => (10, 1200),
            LengthTier::ExtraLong => (12, 1600),
        };
        GenerationPlan {
            scene_count,
            target_word_count,
        }
    }
}

/// Maps a length selection to a plan. Never fails: anything that is not
/// a known tier gets the short plan.
pub fn resolve(selection: &str) -> GenerationPlan {
    match selection.parse::<LengthTier>() {
        Ok(tier) => tier.plan(),
        Err(e) => {
            warn!("{}; using the {} plan", e, LengthTier::Short);
            LengthTier::Short.plan()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_plans() {
        let expected = [
            ("short", 6, 400),
            ("medium", 8, 800),
            ("long", 10, 1200),
            ("extra-long", 12, 1600),
        ];
        for (tier, scenes, words) in expected {
            let plan = resolve(tier);
            assert_eq!(plan.scene_count, scenes, "{}", tier);
            assert_eq!(plan.target_word_count, words, "{}", tier);
        }
    }

    #[test]
    fn test_every_tier_round_trips_through_its_name() {
        for tier in LengthTier::ALL {
            assert_eq!(resolve(tier.as_str()), tier.plan());
        }
    }

    #[test]
    fn test_unknown_tier_defaults_to_short() {
        assert_eq!(resolve("novella"), LengthTier::Short.plan());
        assert_eq!(resolve(""), LengthTier::Short.plan());
    }

    #[test]
    fn test_total_steps() {
        assert_eq!(resolve("short").total_steps(), 8);
        assert_eq!(resolve("extra-long").total_steps(), 14);
    }
}
