//! Built-in skills loaded into every new library.
//!
//! Templates expect `startX`, `startY` and `startZ` to be defined by the
//! executing engine.

use tracing::warn;

use super::types::{ExecutableSkill, SkillCategory};

struct BuiltinSkill {
    name: &'static str,
    description: &'static str,
    category: SkillCategory,
    template: &'static str,
    actions: &'static [&'static str],
    items: &'static [&'static str],
    ticks: u32,
    applicability: &'static str,
}

const BUILTIN_SKILLS: &[BuiltinSkill] = &[
    BuiltinSkill {
        name: "digStaircase",
        description: "Dig a staircase downwards for safe mining",
        category: SkillCategory::Mining,
        template: r#"// Dig staircase of specified depth
var depth = {{depth}};
var direction = {{direction:quote}};
var dx = 0, dz = 0;
if (direction === 'north') dz = -1;
else if (direction === 'south') dz = 1;
else if (direction === 'east') dx = 1;
else if (direction === 'west') dx = -1;

for (var i = 0; i < depth; i++) {
    var posX = startX + (dx * i);
    var posZ = startZ + (dz * i);
    var posY = startY - i;
    agent.mineBlock(posX, posY, posZ);
    if (i % 5 === 0 && i > 0) {
        agent.placeBlock('torch', posX, posY, posZ);
    }
}
"#,
        actions: &["mine", "place"],
        items: &["torch"],
        ticks: 200,
        applicability: "dig.*staircase|stair.*down|mining.*stair",
    },
    BuiltinSkill {
        name: "stripMine",
        description: "Execute a strip mining pattern at Y level -58",
        category: SkillCategory::Mining,
        template: r#"// Strip mine in a straight line
var length = {{length}};
var direction = {{direction:quote}};
var dx = 0, dz = 0;
if (direction === 'north') dz = -1;
else if (direction === 'south') dz = 1;
else if (direction === 'east') dx = 1;
else if (direction === 'west') dx = -1;

for (var i = 0; i < length; i++) {
    var x = startX + (dx * i);
    var z = startZ + (dz * i);
    agent.mineBlock(x, -58, z);
    if (i % 7 === 0) {
        agent.placeBlock('torch', x, -57, z);
    }
}
"#,
        actions: &["mine", "place"],
        items: &["torch", "pickaxe"],
        ticks: 400,
        applicability: "strip.*mine|mining.*line|mine.*tunnel",
    },
    BuiltinSkill {
        name: "branchMine",
        description: "Create branching tunnels from a main mining shaft",
        category: SkillCategory::Mining,
        template: r#"// Branch mining pattern
var branches = {{branches}};
var branchLength = {{branchLength}};
var spacing = 3;

for (var b = 0; b < branches; b++) {
    var offset = b * spacing;
    for (var i = 0; i < branchLength; i++) {
        agent.mineBlock(startX + i, startY, startZ + offset);
        agent.mineBlock(startX + i, startY, startZ + offset + 1);
    }
    if (branchLength > 10) {
        agent.placeBlock('torch', startX + 10, startY, startZ + offset);
    }
}
"#,
        actions: &["mine", "place"],
        items: &["torch", "pickaxe"],
        ticks: 600,
        applicability: "branch.*mine|tunnel.*branch",
    },
    BuiltinSkill {
        name: "buildShelter",
        description: "Build a basic shelter for protection",
        category: SkillCategory::Building,
        template: r#"// Build a box shelter with a door opening
var width = {{width}};
var height = {{height}};
var depth = {{depth}};
var blockType = {{block:quote}};

for (var x = 0; x < width; x++) {
    for (var z = 0; z < depth; z++) {
        agent.placeBlock(blockType, startX + x, startY, startZ + z);
        agent.placeBlock(blockType, startX + x, startY + height, startZ + z);
    }
}
for (var y = 1; y < height; y++) {
    for (var x = 0; x < width; x++) {
        agent.placeBlock(blockType, startX + x, startY + y, startZ);
        agent.placeBlock(blockType, startX + x, startY + y, startZ + depth - 1);
    }
    for (var z = 0; z < depth; z++) {
        agent.placeBlock(blockType, startX, startY + y, startZ + z);
        agent.placeBlock(blockType, startX + width - 1, startY + y, startZ + z);
    }
}
agent.mineBlock(startX + Math.floor(width / 2), startY + 1, startZ);
"#,
        actions: &["place", "mine"],
        items: &[],
        ticks: 500,
        applicability: "build.*shelter|simple.*house|protection",
    },
    BuiltinSkill {
        name: "buildPlatform",
        description: "Build a flat platform for building",
        category: SkillCategory::Building,
        template: r#"var size = {{size}};
var blockType = {{block:quote}};

for (var x = 0; x < size; x++) {
    for (var z = 0; z < size; z++) {
        agent.placeBlock(blockType, startX + x, startY, startZ + z);
    }
}
"#,
        actions: &["place"],
        items: &[],
        ticks: 300,
        applicability: "build.*platform|flat.*area|clearing",
    },
    BuiltinSkill {
        name: "farmWheat",
        description: "Automated wheat farming with tilling and planting",
        category: SkillCategory::Farming,
        template: r#"var size = {{size}};
var rows = {{rows}};

for (var row = 0; row < rows; row++) {
    for (var i = 0; i < size; i++) {
        var x = startX + i;
        var z = startZ + (row * 2);
        agent.useItemOnBlock('hoe', x, startY, z);
        agent.placeBlock('wheat_seeds', x, startY + 1, z);
    }
}
for (var i = 0; i < size; i++) {
    agent.placeBlock('water', startX + i, startY, startZ + 1);
}
"#,
        actions: &["place"],
        items: &["hoe", "wheat_seeds", "water_bucket"],
        ticks: 400,
        applicability: "farm.*wheat|plant.*wheat|wheat.*farm",
    },
    BuiltinSkill {
        name: "farmTree",
        description: "Plant saplings in a grid pattern",
        category: SkillCategory::Farming,
        template: r#"var spacing = {{spacing}};
var count = {{count}};
var saplingType = {{sapling:quote}};

for (var i = 0; i < count; i++) {
    var x = startX + (i % spacing) * spacing;
    var z = startZ + Math.floor(i / spacing) * spacing;
    agent.mineBlock(x, startY, z);
    agent.placeBlock(saplingType, x, startY + 1, z);
}
"#,
        actions: &["mine", "place"],
        items: &["oak_sapling", "birch_sapling", "spruce_sapling"],
        ticks: 200,
        applicability: "farm.*tree|plant.*tree|tree.*farm",
    },
    BuiltinSkill {
        name: "organizeInventory",
        description: "Organize inventory items by type",
        category: SkillCategory::Utility,
        template: r#"var categories = {
    'tools': ['pickaxe', 'axe', 'shovel', 'hoe', 'sword'],
    'blocks': ['dirt', 'stone', 'wood', 'cobblestone'],
    'food': ['bread', 'meat', 'apple', 'carrot'],
    'resources': ['coal', 'iron', 'gold', 'diamond']
};

agent.organizeInventory(categories);
"#,
        actions: &["organize"],
        items: &[],
        ticks: 50,
        applicability: "organize.*inventory|sort.*items",
    },
    BuiltinSkill {
        name: "collectDrops",
        description: "Collect all dropped items in an area",
        category: SkillCategory::Utility,
        template: r#"var radius = {{radius}};

for (var r = 0; r < radius; r++) {
    for (var angle = 0; angle < 360; angle += 45) {
        var x = startX + Math.floor(r * Math.cos(angle));
        var z = startZ + Math.floor(r * Math.sin(angle));
        agent.pathfindTo(x, startY, z);
        agent.collectNearbyItems(5);
    }
}
"#,
        actions: &["pathfind", "collect"],
        items: &[],
        ticks: 300,
        applicability: "collect.*drop|pick.*item|gather.*drop",
    },
];

/// Build the built-in skill set. Entries that fail to build are logged and skipped.
pub fn builtin_skills() -> Vec<ExecutableSkill> {
    BUILTIN_SKILLS
        .iter()
        .filter_map(|entry| {
            let built = ExecutableSkill::builder(entry.name)
                .description(entry.description)
                .category(entry.category)
                .code_template(entry.template)
                .required_actions(entry.actions.iter().copied())
                .required_items(entry.items.iter().copied())
                .estimated_ticks(entry.ticks)
                .applicability_pattern(entry.applicability)
                .build();

            match built {
                Ok(skill) => Some(skill),
                Err(e) => {
                    warn!("Failed to build built-in skill '{}': {}", entry.name, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::types::Skill;
    use crate::task::Task;

    #[test]
    fn test_all_builtins_build() {
        let skills = builtin_skills();
        assert_eq!(skills.len(), BUILTIN_SKILLS.len());
        assert_eq!(skills.len(), 9);
    }

    #[test]
    fn test_builtin_applicability() {
        let skills = builtin_skills();
        let stairs = skills.iter().find(|s| s.name() == "digStaircase").unwrap();

        assert!(stairs.is_applicable(&Task::new("dig").with_param("shape", "staircase")));
        assert_eq!(stairs.category(), SkillCategory::Mining);
        assert_eq!(stairs.required_items(), ["torch".to_string()]);
    }
}
