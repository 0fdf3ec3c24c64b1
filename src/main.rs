//! playsync-sim: drives a playback session over a synthetic decoder.
//!
//! Time is simulated with a manual host clock, so a run is deterministic and
//! finishes as fast as the CPU allows. Useful for watching the loading state
//! machine and the video synchronizer react to decoder stalls.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use playsync::buffering::CapacityCell;
use playsync::core::time;
use playsync::playback::{
    FrameSource, FrameTiming, ManualHostTime, PlaybackSession, PlaybackState, ReferenceClock,
    RenderCommand, RenderLoop, VideoOutput,
};
use playsync::{CapacitySnapshot, MediaType, Result, Seconds, Settings};

#[derive(Parser, Debug)]
#[command(name = "playsync-sim", about = "Simulate buffering and A/V sync over a synthetic stream")]
struct Args {
    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wall-clock seconds to simulate
    #[arg(long, default_value_t = 20.0)]
    seconds: f64,

    /// Media length in seconds
    #[arg(long, default_value_t = 15.0)]
    duration: f64,

    /// Video frame rate
    #[arg(long, default_value_t = 30.0)]
    fps: f32,

    /// Decoder stalls at this wall-clock time
    #[arg(long)]
    stall_at: Option<f64>,

    /// Stall length in seconds
    #[arg(long, default_value_t = 2.0)]
    stall_for: f64,

    /// Decode speed as a multiple of real time
    #[arg(long, default_value_t = 1.5)]
    decode_speed: f64,
}

/// Decoder producing evenly spaced frames up to a fixed length.
struct SyntheticSource {
    frames: VecDeque<Seconds>,
    fps: f32,
    next_pts: Seconds,
    duration: Seconds,
    max_frames: usize,
    budget: f64,
    video_time: Seconds,
}

impl SyntheticSource {
    fn new(fps: f32, duration: Seconds, max_buffer: Seconds) -> Self {
        Self {
            frames: VecDeque::new(),
            fps,
            next_pts: 0.0,
            duration,
            max_frames: (max_buffer * fps as f64).ceil() as usize,
            budget: 0.0,
            video_time: 0.0,
        }
    }

    fn is_end_of_file(&self) -> bool {
        self.next_pts >= self.duration
    }

    /// Decode `elapsed` seconds worth of frames at `speed`.
    fn decode(&mut self, elapsed: Seconds, speed: f64) {
        let interval = time::frame_interval(self.fps).unwrap_or(1.0);
        self.budget += elapsed * speed / interval;
        while self.budget >= 1.0 && self.frames.len() < self.max_frames && !self.is_end_of_file() {
            self.frames.push_back(self.next_pts);
            self.next_pts += interval;
            self.budget -= 1.0;
        }
        if self.frames.len() >= self.max_frames {
            self.budget = 0.0;
        }
    }

    fn snapshot(&self, media_type: MediaType) -> CapacitySnapshot {
        let eof = self.is_end_of_file();
        CapacitySnapshot {
            media_type,
            packet_count: if eof { 0 } else { self.fps.ceil() as usize },
            frame_count: self.frames.len(),
            loaded_time: self.frames.len() as f64 / self.fps as f64,
            is_end_of_file: eof,
        }
    }
}

impl FrameSource for SyntheticSource {
    type Frame = Seconds;

    fn next_frame_timing(&self) -> Option<FrameTiming> {
        self.frames.front().map(|&presentation_time| FrameTiming {
            presentation_time,
            fps: self.fps,
            pending_frames: self.frames.len(),
        })
    }

    fn take_frame(&mut self, _force: bool) -> Option<Seconds> {
        self.frames.pop_front()
    }

    fn drop_next_frame(&mut self) {
        self.frames.pop_front();
    }

    fn drop_gop_packet(&mut self) {
        // one-second GOPs
        let gop_end = self.video_time.floor() + 1.0;
        self.frames.retain(|&pts| pts >= gop_end);
    }

    fn flush(&mut self) {
        self.frames.clear();
    }

    fn seek_video(&mut self, position: Seconds) {
        self.frames.clear();
        self.next_pts = position.max(0.0);
        self.budget = 0.0;
    }

    fn set_video_time(&mut self, time: Seconds) {
        self.video_time = time;
    }
}

#[derive(Default)]
struct CountingOutput {
    rendered: u64,
}

impl VideoOutput<Seconds> for CountingOutput {
    fn render(&mut self, _frame: &Seconds) {
        self.rendered += 1;
    }

    fn flush(&mut self) {}
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    playsync::logging::init(&settings.logging)?;

    let options = Arc::new(settings.options);
    info!(
        display_layer = options.uses_display_layer(),
        "simulating {:.1}s at {} fps",
        args.seconds,
        args.fps
    );
    let host = ManualHostTime::new(0.0);
    let clock = ReferenceClock::with_host_time(Arc::new(host.clone()));
    let mut session = PlaybackSession::new(Arc::clone(&options), clock.clone());
    session.set_bit_rates(vec![800_000, 1_600_000, 3_200_000], args.fps);
    session.record_bit_rate(1_600_000);

    let audio = CapacityCell::new(MediaType::Audio);
    let video = CapacityCell::new(MediaType::Video);
    let source = SyntheticSource::new(args.fps, args.duration, options.max_buffer_duration);
    let mut render = RenderLoop::new(session, source, CountingOutput::default())
        .with_streams(vec![audio.clone(), video.clone()]);

    let step = 1.0 / time::display_frame_rate(args.fps).max(1) as f64;
    let steps = (args.seconds / step).ceil() as u64;
    let mut frozen_at = options.start_play_time;
    let mut switches = 0u32;

    for n in 0..steps {
        let now = n as f64 * step;
        host.advance(step);

        let stalled = args
            .stall_at
            .map_or(false, |at| now >= at && now < at + args.stall_for);
        if !stalled {
            render.source_mut().decode(step, args.decode_speed);
        }
        audio.publish(render.source().snapshot(MediaType::Audio));
        video.publish(render.source().snapshot(MediaType::Video));

        // audio is the master clock and stops while nothing plays
        if render.session().state().is_playing() {
            frozen_at = clock.current_time();
        } else {
            clock.set_position(frozen_at);
        }

        render.tick(false);

        if render.session().state() == PlaybackState::ReadyToPlay {
            render.handle_command(RenderCommand::Play);
        }

        let frame_count = render.source().frames.len();
        let is_playable = render
            .session()
            .last_loading()
            .map_or(false, |loading| loading.is_playable);
        let session = render.session_mut();
        session.update_adaptation(frame_count, is_playable);
        if let Some(switch) = session.adapt_bit_rate() {
            session.record_bit_rate(switch.to);
            switches += 1;
        }

        if render.session().state().is_finished() {
            info!("playback finished at {}", time::format_time(now));
            break;
        }
    }

    let stats = render.stats();
    println!("state:          {}", render.session().state());
    println!("clock:          {}", time::format_time(clock.current_time()));
    println!("ticks:          {}", stats.ticks);
    println!("rendered:       {}", render.output().rendered);
    println!("held:           {}", stats.held);
    println!("idle:           {}", stats.idle);
    println!("dropped frames: {}", stats.dropped_frames);
    println!("dropped gops:   {}", stats.dropped_gops);
    println!("flushes:        {}", stats.flushes);
    println!("seeks:          {}", stats.seeks);
    println!("bitrate steps:  {}", switches);
    Ok(())
}
