// commands/adventure.rs
use crate::error::Error;
use crate::Data;
use poise::serenity_prelude::CreateEmbed;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

type Context<'a> = poise::Context<'a, Data, Error>;

const PLAYER_MAX_HP: i32 = 20;
const PLAYER_AC: i32 = 14;
const PLAYER_ATTACK_BONUS: i32 = 4;
const PLAYER_DAMAGE: DiceRoll = DiceRoll { count: 1, sides: 8, modifier: 2 };
const POTION_HEAL: DiceRoll = DiceRoll { count: 2, sides: 4, modifier: 2 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl FromStr for DiceRoll {
    type Err = Error;

    /// Parses `NdM`, `dM`, `NdM+K` or `NdM-K`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("`{}` isn't dice notation. Try `2d6+3` or `d20`.", s.trim()));
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();

        let (count, rest) = compact.split_once('d').ok_or_else(invalid)?;
        let count: u32 = if count.is_empty() { 1 } else { count.parse().map_err(|_| invalid())? };

        let (sides, modifier) = match rest.find(['+', '-']) {
            Some(idx) => {
                let modifier: i32 = rest[idx..].parse().map_err(|_| invalid())?;
                (&rest[..idx], modifier)
            }
            None => (rest, 0),
        };
        let sides: u32 = sides.parse().map_err(|_| invalid())?;

        if !(1..=100).contains(&count) || !(2..=1000).contains(&sides) || modifier.abs() > 1000 {
            return Err(Error::InvalidInput(
                "Roll 1-100 dice with 2-1000 sides and a modifier up to ±1000.".to_string(),
            ));
        }
        Ok(DiceRoll { count, sides, modifier })
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{}", m),
            m => write!(f, "{}", m),
        }
    }
}

impl DiceRoll {
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec<u32>, i32) {
        let rolls: Vec<u32> = (0..self.count).map(|_| rng.gen_range(1..=self.sides)).collect();
        let total = rolls.iter().sum::<u32>() as i32 + self.modifier;
        (rolls, total)
    }

    fn roll_total<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        self.roll(rng).1.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

struct MonsterKind {
    name: &'static str,
    max_hp: i32,
    ac: i32,
    attack_bonus: i32,
    damage: DiceRoll,
}

struct Room {
    name: &'static str,
    description: &'static str,
    exits: &'static [(Direction, usize)],
    monster: Option<MonsterKind>,
    potion: bool,
    treasure: bool,
}

static DUNGEON: &[Room] = &[
    Room {
        name: "Entrance Hall",
        description: "Torchlight flickers over cracked flagstones. A dark corridor leads north.",
        exits: &[(Direction::North, 1)],
        monster: None,
        potion: false,
        treasure: false,
    },
    Room {
        name: "Guardroom",
        description: "Overturned stools and a half-eaten meal. Doors lead east and north.",
        exits: &[(Direction::South, 0), (Direction::East, 2), (Direction::North, 3)],
        monster: Some(MonsterKind {
            name: "Goblin",
            max_hp: 7,
            ac: 12,
            attack_bonus: 3,
            damage: DiceRoll { count: 1, sides: 6, modifier: 0 },
        }),
        potion: false,
        treasure: false,
    },
    Room {
        name: "Armoury",
        description: "Rusted racks line the walls. Something glints on a shelf.",
        exits: &[(Direction::West, 1)],
        monster: None,
        potion: true,
        treasure: false,
    },
    Room {
        name: "Spider Cavern",
        description: "Thick webs hang from the ceiling. A passage continues north.",
        exits: &[(Direction::South, 1), (Direction::North, 4)],
        monster: Some(MonsterKind {
            name: "Giant Spider",
            max_hp: 11,
            ac: 13,
            attack_bonus: 4,
            damage: DiceRoll { count: 1, sides: 8, modifier: 0 },
        }),
        potion: false,
        treasure: false,
    },
    Room {
        name: "Treasure Vault",
        description: "Gold spills from an iron chest in the middle of the room.",
        exits: &[(Direction::South, 3)],
        monster: Some(MonsterKind {
            name: "Ogre",
            max_hp: 25,
            ac: 11,
            attack_bonus: 5,
            damage: DiceRoll { count: 2, sides: 6, modifier: 0 },
        }),
        potion: false,
        treasure: true,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Victory,
    Defeat,
}

/// One player's run through the dungeon.
#[derive(Debug, Clone)]
pub struct Adventure {
    room: usize,
    previous_room: usize,
    hp: i32,
    monster_hp: Vec<i32>,
    potion_taken: bool,
    turns: u32,
}

impl Default for Adventure {
    fn default() -> Self {
        Self::new()
    }
}

impl Adventure {
    pub fn new() -> Self {
        Self {
            room: 0,
            previous_room: 0,
            hp: PLAYER_MAX_HP,
            monster_hp: DUNGEON
                .iter()
                .map(|room| room.monster.as_ref().map_or(0, |m| m.max_hp))
                .collect(),
            potion_taken: false,
            turns: 0,
        }
    }

    fn current(&self) -> &'static Room {
        &DUNGEON[self.room]
    }

    fn living_monster(&self) -> Option<&'static MonsterKind> {
        self.current().monster.as_ref().filter(|_| self.monster_hp[self.room] > 0)
    }

    pub fn describe(&self) -> String {
        let room = self.current();
        let mut text = format!("**{}**\n{}", room.name, room.description);
        if let Some(monster) = self.living_monster() {
            text.push_str(&format!(
                "\nA **{}** blocks your way! ({} HP)",
                monster.name, self.monster_hp[self.room]
            ));
        }
        let exits = room.exits.iter().map(|(d, _)| d.label()).collect::<Vec<_>>().join(", ");
        text.push_str(&format!("\nExits: {}", exits));
        text
    }

    pub fn status(&self) -> String {
        format!("HP {}/{} · {} · turn {}", self.hp, PLAYER_MAX_HP, self.current().name, self.turns)
    }

    pub fn go<R: Rng + ?Sized>(&mut self, direction: Direction, rng: &mut R) -> (String, Outcome) {
        if let Some(monster) = self.living_monster() {
            return (
                format!("The {} won't let you past. Fight or flee!", monster.name),
                Outcome::Continue,
            );
        }
        let Some(&(_, target)) = self.current().exits.iter().find(|(d, _)| *d == direction) else {
            return (format!("You can't go {} from here.", direction.label()), Outcome::Continue);
        };

        self.turns += 1;
        self.previous_room = self.room;
        self.room = target;

        let mut text = self.describe();
        if self.current().potion && !self.potion_taken {
            self.potion_taken = true;
            let healed = POTION_HEAL.roll_total(rng).min(PLAYER_MAX_HP - self.hp);
            self.hp += healed;
            text.push_str(&format!("\nYou drink a healing potion and recover {} HP.", healed));
        }
        (text, Outcome::Continue)
    }

    pub fn attack<R: Rng + ?Sized>(&mut self, rng: &mut R) -> (String, Outcome) {
        let Some(monster) = self.living_monster() else {
            return ("There's nothing here to fight.".to_string(), Outcome::Continue);
        };
        self.turns += 1;
        let mut log = Vec::new();

        let roll = rng.gen_range(1..=20);
        if roll == 20 || (roll != 1 && roll + PLAYER_ATTACK_BONUS >= monster.ac) {
            let mut damage = PLAYER_DAMAGE.roll_total(rng);
            if roll == 20 {
                damage += PLAYER_DAMAGE.roll(rng).0.iter().sum::<u32>() as i32;
                log.push(format!("Critical hit! You deal {} damage to the {}.", damage, monster.name));
            } else {
                log.push(format!("You hit the {} for {} damage.", monster.name, damage));
            }
            self.monster_hp[self.room] -= damage;
        } else {
            log.push(format!("You swing at the {} and miss ({}).", monster.name, roll + PLAYER_ATTACK_BONUS));
        }

        if self.monster_hp[self.room] <= 0 {
            log.push(format!("The {} is defeated!", monster.name));
            if self.current().treasure {
                log.push("The treasure is yours. You win! 🏆".to_string());
                return (log.join("\n"), Outcome::Victory);
            }
            return (log.join("\n"), Outcome::Continue);
        }

        let outcome = self.monster_attacks(monster, rng, &mut log);
        (log.join("\n"), outcome)
    }

    pub fn flee<R: Rng + ?Sized>(&mut self, rng: &mut R) -> (String, Outcome) {
        let Some(monster) = self.living_monster() else {
            return ("There's nothing to flee from.".to_string(), Outcome::Continue);
        };
        self.turns += 1;
        let mut log = vec![format!("You turn and run from the {}!", monster.name)];

        let outcome = self.monster_attacks(monster, rng, &mut log);
        if outcome == Outcome::Continue {
            std::mem::swap(&mut self.room, &mut self.previous_room);
            log.push(format!("You escape back to the {}.", self.current().name));
        }
        (log.join("\n"), outcome)
    }

    fn monster_attacks<R: Rng + ?Sized>(&mut self, monster: &MonsterKind, rng: &mut R, log: &mut Vec<String>) -> Outcome {
        let roll = rng.gen_range(1..=20);
        if roll == 20 || (roll != 1 && roll + monster.attack_bonus >= PLAYER_AC) {
            let damage = monster.damage.roll_total(rng);
            self.hp -= damage;
            log.push(format!("The {} hits you for {} damage. ({} HP left)", monster.name, damage, self.hp.max(0)));
        } else {
            log.push(format!("The {} misses you.", monster.name));
        }

        if self.hp <= 0 {
            log.push("You collapse. Your adventure ends here. 💀".to_string());
            Outcome::Defeat
        } else {
            Outcome::Continue
        }
    }
}

/// Roll dice using NdM+K notation
#[poise::command(slash_command, category = "Adventure")]
pub async fn roll(
    ctx: Context<'_>,
    #[description = "Dice, e.g. 2d6+3 or d20"] dice: String,
) -> Result<(), Error> {
    let dice: DiceRoll = dice.parse()?;
    let (rolls, total) = dice.roll(&mut rand::thread_rng());

    let shown = if rolls.len() > 20 {
        format!("{} dice", rolls.len())
    } else {
        rolls.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
    };
    ctx.say(format!("🎲 **{}** → [{}] = **{}**", dice, shown, total)).await?;

    Ok(())
}

/// A short dungeon crawl
#[poise::command(
    slash_command,
    subcommands("start", "look", "go", "attack", "flee", "status"),
    category = "Adventure"
)]
pub async fn adventure(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start (or restart) your adventure
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let adventure = Adventure::new();
    let text = adventure.describe();
    ctx.data().adventures_lock().insert(ctx.author().id.get(), adventure);

    send_turn(ctx, "A new adventure begins", text, None).await
}

/// Look around the current room
#[poise::command(slash_command)]
pub async fn look(ctx: Context<'_>) -> Result<(), Error> {
    let text = with_session(ctx, |adventure| (adventure.describe(), Outcome::Continue))?;
    send_turn(ctx, "You look around", text.0, Some(text.1)).await
}

/// Walk through an exit
#[poise::command(slash_command)]
pub async fn go(
    ctx: Context<'_>,
    #[description = "Direction to walk"] direction: Direction,
) -> Result<(), Error> {
    let (text, outcome) = with_session(ctx, |adventure| adventure.go(direction, &mut rand::thread_rng()))?;
    send_turn(ctx, &format!("You head {}", direction.label()), text, Some(outcome)).await
}

/// Attack the monster in this room
#[poise::command(slash_command)]
pub async fn attack(ctx: Context<'_>) -> Result<(), Error> {
    let (text, outcome) = with_session(ctx, |adventure| adventure.attack(&mut rand::thread_rng()))?;
    send_turn(ctx, "Combat", text, Some(outcome)).await
}

/// Run back the way you came
#[poise::command(slash_command)]
pub async fn flee(ctx: Context<'_>) -> Result<(), Error> {
    let (text, outcome) = with_session(ctx, |adventure| adventure.flee(&mut rand::thread_rng()))?;
    send_turn(ctx, "Retreat", text, Some(outcome)).await
}

/// Show your hit points and location
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let (text, _) = with_session(ctx, |adventure| (adventure.status(), Outcome::Continue))?;
    ctx.say(text).await?;
    Ok(())
}

/// Runs `action` on the caller's session, ending it on victory or defeat.
fn with_session<F>(ctx: Context<'_>, action: F) -> Result<(String, Outcome), Error>
where
    F: FnOnce(&mut Adventure) -> (String, Outcome),
{
    let user_id = ctx.author().id.get();
    let mut sessions = ctx.data().adventures_lock();
    let adventure = sessions
        .get_mut(&user_id)
        .ok_or_else(|| Error::InvalidInput("You aren't on an adventure. Use `/adventure start`.".to_string()))?;

    let (text, outcome) = action(adventure);
    if outcome != Outcome::Continue {
        sessions.remove(&user_id);
        tracing::info!("Adventure for user {} ended: {:?}", user_id, outcome);
    }
    Ok((text, outcome))
}

async fn send_turn(ctx: Context<'_>, title: &str, text: String, outcome: Option<Outcome>) -> Result<(), Error> {
    let colour = match outcome {
        Some(Outcome::Victory) => 0xFFD700,
        Some(Outcome::Defeat) => 0x8B0000,
        _ => 0x7B68EE,
    };
    let embed = CreateEmbed::new().title(title).description(text).color(colour);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parses_dice_notation() {
        assert_eq!("2d6+3".parse::<DiceRoll>().unwrap(), DiceRoll { count: 2, sides: 6, modifier: 3 });
        assert_eq!("d20".parse::<DiceRoll>().unwrap(), DiceRoll { count: 1, sides: 20, modifier: 0 });
        assert_eq!(" 4D8 - 2 ".parse::<DiceRoll>().unwrap(), DiceRoll { count: 4, sides: 8, modifier: -2 });
        assert!("d1".parse::<DiceRoll>().is_err());
        assert!("101d6".parse::<DiceRoll>().is_err());
        assert!("2x6".parse::<DiceRoll>().is_err());
        assert!("2d6+".parse::<DiceRoll>().is_err());
        assert_eq!("3d4-1".parse::<DiceRoll>().unwrap().to_string(), "3d4-1");
    }

    #[test]
    fn rolls_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let dice = DiceRoll { count: 3, sides: 6, modifier: 2 };
        for _ in 0..500 {
            let (rolls, total) = dice.roll(&mut rng);
            assert_eq!(rolls.len(), 3);
            assert!(rolls.iter().all(|r| (1..=6).contains(r)));
            assert!((5..=20).contains(&total));
        }
    }

    #[test]
    fn monsters_block_movement_and_walls_are_solid() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut adventure = Adventure::new();

        let (text, _) = adventure.go(Direction::West, &mut rng);
        assert!(text.contains("can't go west"));

        adventure.go(Direction::North, &mut rng);
        assert_eq!(adventure.room, 1);
        let (text, _) = adventure.go(Direction::East, &mut rng);
        assert!(text.contains("Goblin"));
        assert_eq!(adventure.room, 1);
    }

    #[test]
    fn fighting_through_to_the_vault_ends_in_victory() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut adventure = Adventure::new();
        adventure.hp = 10_000;

        adventure.go(Direction::North, &mut rng);
        let mut last = Outcome::Continue;
        for direction in [Direction::North, Direction::North] {
            while adventure.living_monster().is_some() {
                last = adventure.attack(&mut rng).1;
            }
            assert_eq!(last, Outcome::Continue);
            adventure.go(direction, &mut rng);
        }

        assert_eq!(adventure.current().name, "Treasure Vault");
        while adventure.living_monster().is_some() {
            last = adventure.attack(&mut rng).1;
        }
        assert_eq!(last, Outcome::Victory);
    }

    #[test]
    fn fleeing_either_escapes_or_ends_the_run() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            let mut adventure = Adventure::new();
            adventure.go(Direction::North, &mut rng);
            adventure.hp = 1;

            match adventure.flee(&mut rng).1 {
                Outcome::Defeat => assert!(adventure.hp <= 0),
                Outcome::Continue => assert_eq!(adventure.room, 0),
                Outcome::Victory => panic!("fleeing never wins"),
            }
        }

        let mut calm = Adventure::new();
        let (text, _) = calm.flee(&mut rng);
        assert_eq!(text, "There's nothing to flee from.");
    }

    #[test]
    fn potion_heals_once() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut adventure = Adventure::new();
        adventure.monster_hp[1] = 0;
        adventure.hp = 5;

        adventure.go(Direction::North, &mut rng);
        adventure.go(Direction::East, &mut rng);
        let healed = adventure.hp;
        assert!(healed > 5);

        adventure.go(Direction::West, &mut rng);
        adventure.go(Direction::East, &mut rng);
        assert_eq!(adventure.hp, healed);
    }
}
