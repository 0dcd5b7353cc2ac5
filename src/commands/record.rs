// commands/record.rs
use crate::error::Error;
use crate::utils::require_guild;
use crate::Data;
use poise::serenity_prelude::{ChannelId, CreateAttachment, GuildId};
use serenity::async_trait;
use songbird::{CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

type Context<'a> = poise::Context<'a, Data, Error>;

/// Discord voice is decoded at 48kHz.
pub const SAMPLE_RATE: u32 = 48_000;
/// Mono samples in one 20ms voice tick.
const TICK_SAMPLES: usize = (SAMPLE_RATE / 50) as usize;

/// Mono PCM collected from a voice channel, capped at a fixed length.
#[derive(Debug)]
pub struct RecordingBuffer {
    samples: Vec<i16>,
    max_samples: usize,
}

impl RecordingBuffer {
    pub fn new(max_seconds: u64) -> Self {
        Self {
            samples: Vec::new(),
            max_samples: max_seconds as usize * SAMPLE_RATE as usize,
        }
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max_samples
    }

    pub fn seconds(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Mixes every speaker's stereo frame down to one mono tick and appends it.
    /// A tick with no speakers is recorded as silence.
    pub fn push_tick(&mut self, speakers: &[&[i16]]) {
        if self.is_full() {
            return;
        }

        let mut mixed = vec![0i32; TICK_SAMPLES];
        for frame in speakers {
            for (slot, pair) in mixed.iter_mut().zip(frame.chunks_exact(2)) {
                *slot += (pair[0] as i32 + pair[1] as i32) / 2;
            }
        }

        let room = self.max_samples - self.samples.len();
        self.samples.extend(
            mixed
                .into_iter()
                .take(room)
                .map(|sample| sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16),
        );
    }

    pub fn take(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }
}

/// 16-bit mono PCM wrapped in a RIFF/WAVE header.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut wav = Vec::with_capacity(44 + data_len as usize);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

struct VoiceReceiver {
    buffer: Arc<Mutex<RecordingBuffer>>,
}

#[async_trait]
impl VoiceEventHandler for VoiceReceiver {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::VoiceTick(tick) = ctx {
            let speakers: Vec<&[i16]> = tick
                .speaking
                .values()
                .filter_map(|data| data.decoded_voice.as_deref())
                .collect();
            self.buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_tick(&speakers);
        }
        None
    }
}

fn caller_voice_channel(ctx: Context<'_>) -> Option<ChannelId> {
    let guild = ctx.guild()?;
    guild.voice_states.get(&ctx.author().id).and_then(|state| state.channel_id)
}

async fn voice_manager(ctx: Context<'_>) -> Result<Arc<songbird::Songbird>, Error> {
    songbird::get(ctx.serenity_context())
        .await
        .ok_or_else(|| Error::Unknown("Voice client is not initialised".to_string()))
}

/// Record the voice channel you're in
#[poise::command(slash_command, subcommands("start", "stop"), guild_only, category = "Voice")]
pub async fn record(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Join your voice channel and start recording
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let channel_id = caller_voice_channel(ctx)
        .ok_or_else(|| Error::InvalidInput("Join a voice channel first.".to_string()))?;

    let max_seconds = ctx.data().config.recording.max_seconds;
    let buffer = Arc::new(Mutex::new(RecordingBuffer::new(max_seconds)));
    {
        let mut recordings = ctx.data().recordings_lock();
        if recordings.contains_key(&(guild_id as u64)) {
            return Err(Error::InvalidInput("Already recording in this server.".to_string()));
        }
        recordings.insert(guild_id as u64, buffer.clone());
    }

    ctx.defer().await?;
    let manager = voice_manager(ctx).await?;
    let call = match manager.join(GuildId::new(guild_id as u64), channel_id).await {
        Ok(call) => call,
        Err(e) => {
            ctx.data().recordings_lock().remove(&(guild_id as u64));
            return Err(e.into());
        }
    };
    call.lock()
        .await
        .add_global_event(CoreEvent::VoiceTick.into(), VoiceReceiver { buffer });

    info!("Recording channel {} in guild {}", channel_id, guild_id);
    ctx.say(format!(
        "🔴 Recording <#{}> for up to {} seconds. Use `/record stop` to finish.",
        channel_id, max_seconds
    ))
    .await?;

    Ok(())
}

/// Stop recording and upload the audio
#[poise::command(slash_command)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let buffer = ctx
        .data()
        .recordings_lock()
        .remove(&(guild_id as u64))
        .ok_or_else(|| Error::InvalidInput("Not recording in this server.".to_string()))?;

    ctx.defer().await?;
    let manager = voice_manager(ctx).await?;
    if let Err(e) = manager.remove(GuildId::new(guild_id as u64)).await {
        warn!("Failed to leave voice in guild {}: {}", guild_id, e);
    }

    let (samples, seconds) = {
        let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let seconds = buffer.seconds();
        (buffer.take(), seconds)
    };
    if samples.iter().all(|sample| *sample == 0) {
        ctx.say("Nothing was heard, so there's nothing to upload.").await?;
        return Ok(());
    }

    let reply = poise::CreateReply::default()
        .content(format!("⏹️ Recorded {:.1} seconds.", seconds))
        .attachment(CreateAttachment::bytes(encode_wav(&samples, SAMPLE_RATE), "recording.wav"));
    ctx.send(reply).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(left: i16, right: i16) -> Vec<i16> {
        [left, right].repeat(TICK_SAMPLES)
    }

    #[test]
    fn speakers_are_mixed_to_mono() {
        let mut buffer = RecordingBuffer::new(1);
        let a = stereo(100, 300);
        let b = stereo(-50, -50);
        buffer.push_tick(&[&a, &b]);

        let samples = buffer.take();
        assert_eq!(samples.len(), TICK_SAMPLES);
        assert!(samples.iter().all(|s| *s == 150));
    }

    #[test]
    fn loud_mixes_saturate_instead_of_wrapping() {
        let mut buffer = RecordingBuffer::new(1);
        let loud = stereo(i16::MAX, i16::MAX);
        buffer.push_tick(&[&loud, &loud]);
        assert!(buffer.take().iter().all(|s| *s == i16::MAX));
    }

    #[test]
    fn silence_keeps_time_and_length_is_capped() {
        let mut buffer = RecordingBuffer::new(1);
        for _ in 0..49 {
            buffer.push_tick(&[]);
        }
        assert!(!buffer.is_full());
        assert!((buffer.seconds() - 0.98).abs() < 1e-9);

        buffer.push_tick(&[]);
        buffer.push_tick(&[]);
        assert!(buffer.is_full());
        assert_eq!(buffer.take().len(), SAMPLE_RATE as usize);
    }

    #[test]
    fn wav_header_describes_mono_pcm() {
        let wav = encode_wav(&[1, -1, 256], SAMPLE_RATE);

        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 6);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 48_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 96_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 6);
        assert_eq!(&wav[44..], &[1, 0, 0xFF, 0xFF, 0, 1]);
    }
}
