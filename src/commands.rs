// commands.rs
mod adventure;
mod aircraft;
mod airport;
mod alerts;
mod bible;
mod counter;
pub mod enumber;
pub mod ghostping;
mod help;
pub mod loans;
pub mod pancakes;
mod radiosonde;
mod record;
pub mod typowatch;
mod xkcd;

pub use adventure::Adventure;
pub use record::RecordingBuffer;

use crate::error::Error;
use crate::Data;

pub fn get_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        help::help(),
        aircraft::aircraft(),
        alerts::skyalerts(),
        airport::airport(),
        bible::bible(),
        enumber::enumber(),
        radiosonde::sonde(),
        xkcd::xkcd(),
        counter::counter(),
        loans::loan(),
        pancakes::pancake(),
        adventure::roll(),
        adventure::adventure(),
        typowatch::typowatch(),
        ghostping::ghostping(),
        record::record(),
    ]
}
