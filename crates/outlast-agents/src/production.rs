//! Production tables: recipes, build definitions, foods, and tool bonuses.
//!
//! The tables are static slices so lookups stay allocation-free and the
//! declaration order doubles as the iteration order.

use outlast_types::{BedQuality, ObjectKind};

/// A crafting recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    /// Recipe id used by craft intents.
    pub id: u32,
    /// Consumed items.
    pub inputs: &'static [(&'static str, i32)],
    /// Produced items.
    pub outputs: &'static [(&'static str, i32)],
}

/// A buildable object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildDef {
    /// Build name used by build intents.
    pub object_type: &'static str,
    /// Resulting object category.
    pub kind: ObjectKind,
    /// Consumed materials.
    pub cost: &'static [(&'static str, i32)],
}

impl BuildDef {
    /// Bed quality of the built object, for beds.
    pub fn bed_quality(&self) -> Option<BedQuality> {
        match self.kind {
            ObjectKind::Bed if self.object_type == "bed_good" => Some(BedQuality::Good),
            ObjectKind::Bed => Some(BedQuality::Rough),
            _ => None,
        }
    }
}

const RECIPES: &[Recipe] = &[
    Recipe {
        id: 1,
        inputs: &[("wood", 2)],
        outputs: &[("plank", 1)],
    },
    Recipe {
        id: 2,
        inputs: &[("wheat", 2)],
        outputs: &[("bread", 1)],
    },
];

const BUILDS: &[BuildDef] = &[
    BuildDef {
        object_type: "bed",
        kind: ObjectKind::Bed,
        cost: &[("wood", 8)],
    },
    BuildDef {
        object_type: "bed_rough",
        kind: ObjectKind::Bed,
        cost: &[("wood", 8)],
    },
    BuildDef {
        object_type: "bed_good",
        kind: ObjectKind::Bed,
        cost: &[("wood", 6), ("berry", 2)],
    },
    BuildDef {
        object_type: "box",
        kind: ObjectKind::Box,
        cost: &[("wood", 4)],
    },
    BuildDef {
        object_type: "farm_plot",
        kind: ObjectKind::Farm,
        cost: &[("wood", 2), ("stone", 2)],
    },
    BuildDef {
        object_type: "torch",
        kind: ObjectKind::Torch,
        cost: &[("wood", 1)],
    },
    BuildDef {
        object_type: "wall",
        kind: ObjectKind::Wall,
        cost: &[("stone", 3)],
    },
    BuildDef {
        object_type: "door",
        kind: ObjectKind::Door,
        cost: &[("wood", 2)],
    },
    BuildDef {
        object_type: "furnace",
        kind: ObjectKind::Furnace,
        cost: &[("stone", 6)],
    },
];

const FOODS: &[(&str, i32)] = &[("berry", 12), ("bread", 28), ("wheat", 16), ("jam", 80)];

/// Look up a recipe by id.
pub fn recipe(id: u32) -> Option<&'static Recipe> {
    RECIPES.iter().find(|r| r.id == id)
}

/// Look up a build definition. Matching ignores case and surrounding whitespace.
pub fn build_def(object_type: &str) -> Option<&'static BuildDef> {
    let normalized = object_type.trim().to_ascii_lowercase();
    BUILDS.iter().find(|b| b.object_type == normalized)
}

/// Hunger recovered by eating one unit of `item`, if it is food.
pub fn food_recovery(item: &str) -> Option<i32> {
    FOODS
        .iter()
        .find(|(name, _)| *name == item)
        .map(|(_, hunger)| *hunger)
}

/// Yield multiplier for gathering `item` given the tools held.
pub fn gather_multiplier(item: &str, has_item: impl Fn(&str) -> bool) -> i32 {
    match item {
        "wood" if has_item("tool_axe") => 2,
        "stone" if has_item("tool_pickaxe") => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipes_resolve_by_id() {
        assert_eq!(recipe(1).map(|r| r.outputs), Some(&[("plank", 1)][..]));
        assert_eq!(recipe(2).map(|r| r.inputs), Some(&[("wheat", 2)][..]));
        assert!(recipe(3).is_none());
    }

    #[test]
    fn build_lookup_normalizes_name() {
        let def = build_def("  Bed_Good ");
        assert_eq!(def.map(|d| d.kind), Some(ObjectKind::Bed));
        assert_eq!(def.and_then(BuildDef::bed_quality), Some(BedQuality::Good));
        assert_eq!(
            build_def("bed").and_then(BuildDef::bed_quality),
            Some(BedQuality::Rough)
        );
        assert!(build_def("castle").is_none());
        assert!(build_def("box").and_then(BuildDef::bed_quality).is_none());
    }

    #[test]
    fn food_values() {
        assert_eq!(food_recovery("berry"), Some(12));
        assert_eq!(food_recovery("jam"), Some(80));
        assert_eq!(food_recovery("wood"), None);
    }

    #[test]
    fn tools_double_matching_resource() {
        assert_eq!(gather_multiplier("wood", |i| i == "tool_axe"), 2);
        assert_eq!(gather_multiplier("stone", |i| i == "tool_axe"), 1);
        assert_eq!(gather_multiplier("stone", |i| i == "tool_pickaxe"), 2);
        assert_eq!(gather_multiplier("berry", |_| true), 1);
    }
}
