//! Static sound catalog.

use crate::sound::{
    Category, FilterSpec, Modulation, NoiseColor, SoundDescriptor, SoundSource, SynthParams,
};
use crate::SoundId;

const fn file(
    id: &'static str,
    name: &'static str,
    category: Category,
    locator: &'static str,
) -> SoundDescriptor {
    SoundDescriptor {
        id,
        name,
        category,
        source: SoundSource::File { locator },
    }
}

const fn synth(id: &'static str, name: &'static str, params: SynthParams) -> SoundDescriptor {
    SoundDescriptor {
        id,
        name,
        category: Category::ColorNoise,
        source: SoundSource::Synthetic(params),
    }
}

static CATALOG: [SoundDescriptor; 34] = [
    file("light-drizzle", "Light Drizzle", Category::Rain, "/sounds/light-drizzle.mp3"),
    file("gentle-rain", "Steady Gentle Rain", Category::Rain, "/sounds/gentle-rain.mp3"),
    file("rain-window", "Rain on a Windowpane", Category::Rain, "/sounds/rain-window.mp3"),
    file("rain-tent", "Rain on a Tent", Category::Rain, "/sounds/rain-tent.mp3"),
    file("heavy-downpour", "Heavy Downpour", Category::Rain, "/sounds/heavy-downpour.mp3"),
    file("rain-tin-roof", "Rain on a Tin Roof", Category::Rain, "/sounds/rain-tin-roof.mp3"),
    file("distant-thunder", "Distant Thunder Rumble", Category::Thunder, "/sounds/distant-thunder.mp3"),
    file("rolling-thunder", "Rolling Thunder", Category::Thunder, "/sounds/rolling-thunder.mp3"),
    file("small-stream", "Small Stream", Category::Waterways, "/sounds/small-stream.mp3"),
    file("babbling-brook", "Babbling Brook", Category::Waterways, "/sounds/babbling-brook.mp3"),
    file("gentle-river", "Gentle River Flow", Category::Waterways, "/sounds/gentle-river.mp3"),
    file("large-waterfall", "Large, Roaring Waterfall", Category::Waterways, "/sounds/large-waterfall.mp3"),
    file("gentle-waves", "Gentle Lapping Waves", Category::Ocean, "/sounds/gentle-waves.mp3"),
    file("calm-waves-beach", "Calm Waves on Sandy Beach", Category::Ocean, "/sounds/calm-waves-beach.mp3"),
    file("distant-seagulls", "Distant Seagulls Calling", Category::Ocean, "/sounds/distant-seagulls.mp3"),
    file("deep-ocean", "Deep Ocean Waves", Category::Ocean, "/sounds/deep-ocean.mp3"),
    file("crashing-waves", "Crashing Waves on Rocks", Category::Ocean, "/sounds/crashing-waves.mp3"),
    file("whale-song", "Whale Song", Category::Ocean, "/sounds/whale-song.mp3"),
    file("temperate-forest", "Temperate Forest (Night)", Category::Forest, "/sounds/temperate-forest.mp3"),
    file("wind-pines", "Wind Through Pine Trees", Category::Forest, "/sounds/wind-pines.mp3"),
    file("swamp-night", "Swamp at Night", Category::Forest, "/sounds/swamp-night.mp3"),
    file("owl-hooting", "Owl Hooting (Barn Owl)", Category::Creatures, "/sounds/owl-hooting.mp3"),
    file("crickets", "Crickets Chirping", Category::Creatures, "/sounds/crickets.mp3"),
    file("cat-purring", "Cat Purring", Category::Creatures, "/sounds/cat-purring.mp3"),
    file("small-campfire", "Small Campfire", Category::Fire, "/sounds/small-campfire.mp3"),
    file("fireplace", "Crackling Fireplace", Category::Fire, "/sounds/fireplace.mp3"),
    synth("white-noise", "White Noise", SynthParams::plain(NoiseColor::White)),
    synth("pink-noise", "Pink Noise", SynthParams::plain(NoiseColor::Pink)),
    synth("brown-noise", "Brown Noise", SynthParams::plain(NoiseColor::Brown)),
    synth(
        "box-fan",
        "Box Fan",
        SynthParams {
            color: NoiseColor::White,
            filter: Some(FilterSpec { cutoff_hz: 1000.0 }),
            modulation: Some(Modulation {
                rate_hz: 0.5,
                depth_hz: 200.0,
            }),
        },
    ),
    synth(
        "airplane-cabin",
        "Airplane Cabin",
        SynthParams {
            color: NoiseColor::Brown,
            filter: Some(FilterSpec { cutoff_hz: 2000.0 }),
            modulation: None,
        },
    ),
    file("blizzard", "Howling Blizzard", Category::Ambient, "/sounds/blizzard.mp3"),
    file("coffee-shop", "Quiet Coffee Shop Chatter", Category::Ambient, "/sounds/coffee-shop.mp3"),
    file("grandfather-clock", "Grandfather Clock Ticking", Category::Ambient, "/sounds/grandfather-clock.mp3"),
];

/// Read-only lookup over the built-in catalog.
///
/// The catalog is compiled in, so the registry is a zero-sized handle and
/// cheap to copy into every component that validates ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoundRegistry;

impl SoundRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get(&self, id: &str) -> Option<&'static SoundDescriptor> {
        CATALOG.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> &'static [SoundDescriptor] {
        &CATALOG
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &'static SoundDescriptor> {
        CATALOG.iter().filter(move |d| d.category == category)
    }

    pub fn ids(&self) -> impl Iterator<Item = SoundId> {
        CATALOG.iter().map(SoundDescriptor::sound_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_unique() {
        let registry = SoundRegistry::new();
        let ids: HashSet<_> = registry.all().iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), registry.all().len());
    }

    #[test]
    fn test_every_category_populated() {
        let registry = SoundRegistry::new();
        for category in Category::ALL {
            assert!(
                registry.by_category(category).next().is_some(),
                "no sounds in {category}"
            );
        }
    }

    #[test]
    fn test_synthetic_entries() {
        let registry = SoundRegistry::new();
        let synthetic: Vec<_> = registry
            .all()
            .iter()
            .filter(|d| d.is_synthetic())
            .map(|d| d.id)
            .collect();
        assert_eq!(
            synthetic,
            vec!["white-noise", "pink-noise", "brown-noise", "box-fan", "airplane-cabin"]
        );

        let fan = registry.get("box-fan").unwrap().synth_params().unwrap();
        assert_eq!(fan.color, NoiseColor::White);
        assert_eq!(fan.filter.unwrap().cutoff_hz, 1000.0);
        assert_eq!(fan.modulation.unwrap().rate_hz, 0.5);
    }

    #[test]
    fn test_file_locators_follow_id() {
        for d in SoundRegistry.all() {
            if let SoundSource::File { locator } = d.source {
                assert_eq!(locator, format!("/sounds/{}.mp3", d.id));
            }
        }
    }

    #[test]
    fn test_unknown_id() {
        assert!(SoundRegistry.get("rain").is_none());
        assert!(!SoundRegistry.contains(""));
        assert!(SoundRegistry.contains("gentle-rain"));
    }
}
