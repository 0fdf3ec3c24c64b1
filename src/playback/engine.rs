//! Render loop driving video presentation against the reference clock.
//!
//! `RenderLoop::tick` runs once per display refresh: it re-evaluates loading,
//! asks the session how to treat the next decoded frame, and applies that to
//! the frame source and the video output. `spawn` moves the loop onto its own
//! thread, paced by a crossbeam ticker and steered through a command channel.

use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, info, warn};

use crate::buffering::capacity::CapacityCell;
use crate::core::time::{self, Seconds};
use crate::error::{Error, Result};
use crate::playback::session::PlaybackSession;
use crate::playback::sync::{FrameTiming, SyncAction};

/// Decoded-video side of the pipeline, as seen by the render loop.
pub trait FrameSource: Send {
    type Frame: Send;

    /// Timing of the next decoded frame, if any.
    fn next_frame_timing(&self) -> Option<FrameTiming>;

    /// Remove the next frame from the queue. `force` asks the source to hand
    /// over whatever it has even if it would normally wait.
    fn take_frame(&mut self, force: bool) -> Option<Self::Frame>;

    /// Discard the frame after the one just presented.
    fn drop_next_frame(&mut self);

    /// Discard undecoded packets up to the next keyframe.
    fn drop_gop_packet(&mut self);

    /// Discard all queued packets and frames.
    fn flush(&mut self);

    /// Reposition the video track alone.
    fn seek_video(&mut self, position: Seconds);

    /// Presentation time of the frame now on screen.
    fn set_video_time(&mut self, _time: Seconds) {}
}

/// Presentation target for decoded frames.
pub trait VideoOutput<F>: Send {
    fn render(&mut self, frame: &F);

    /// Called when a refresh presents nothing new.
    fn idle(&mut self) {}

    /// Drop anything queued for display.
    fn flush(&mut self);
}

/// What one refresh did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing, or no frame decoded yet
    Idle,
    /// Frame is early; current picture kept
    Held { diff: Seconds },
    /// A frame was presented after `action`
    Rendered { diff: Seconds, action: SyncAction },
    /// Forced presentation, no synchronization
    Forced,
    /// Video queue flushed
    Flushed { diff: Seconds },
    /// Video track repositioned at `position`
    Seeked { diff: Seconds, position: Seconds },
}

/// Counters kept across ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub ticks: u64,
    pub rendered: u64,
    pub held: u64,
    pub idle: u64,
    pub dropped_frames: u64,
    pub dropped_gops: u64,
    pub flushes: u64,
    pub seeks: u64,
}

/// Commands accepted by a spawned render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    Play,
    Pause,
    Seek(Seconds),
    /// Present one frame immediately (frame stepping while paused)
    ReadNextFrame,
    Stop,
}

/// Video render loop
pub struct RenderLoop<S, O>
where
    S: FrameSource,
    O: VideoOutput<S::Frame>,
{
    session: PlaybackSession,
    source: S,
    output: O,
    streams: Vec<CapacityCell>,
    stats: RenderStats,
}

impl<S, O> RenderLoop<S, O>
where
    S: FrameSource,
    O: VideoOutput<S::Frame>,
{
    pub fn new(session: PlaybackSession, source: S, output: O) -> Self {
        Self {
            session,
            source,
            output,
            streams: Vec::new(),
            stats: RenderStats::default(),
        }
    }

    /// Streams whose capacity is re-evaluated at the start of every tick.
    pub fn with_streams(mut self, streams: Vec<CapacityCell>) -> Self {
        self.streams = streams;
        self
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession {
        &mut self.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn into_parts(self) -> (PlaybackSession, S, O) {
        (self.session, self.source, self.output)
    }

    /// One display refresh.
    pub fn tick(&mut self, force: bool) -> TickOutcome {
        self.stats.ticks += 1;
        if !self.streams.is_empty() {
            self.session.evaluate_streams(&self.streams);
        }

        if force {
            let timing = self.source.next_frame_timing();
            return match self.source.take_frame(true) {
                Some(frame) => {
                    self.present(&frame, timing.map(|t| t.presentation_time));
                    TickOutcome::Forced
                }
                None => self.idle(),
            };
        }

        if !self.session.state().renders_video() {
            return self.idle();
        }
        let Some(timing) = self.source.next_frame_timing() else {
            return self.idle();
        };

        let decision = self.session.synchronize_video(&timing);
        let diff = decision.diff;
        match decision.action {
            SyncAction::Remain => {
                self.stats.held += 1;
                self.output.idle();
                TickOutcome::Held { diff }
            }
            action @ (SyncAction::Next | SyncAction::DropNextFrame | SyncAction::DropGopPacket) => {
                let Some(frame) = self.source.take_frame(false) else {
                    return self.idle();
                };
                self.present(&frame, Some(timing.presentation_time));
                match action {
                    SyncAction::DropNextFrame => {
                        self.source.drop_next_frame();
                        self.stats.dropped_frames += 1;
                    }
                    SyncAction::DropGopPacket => {
                        self.source.drop_gop_packet();
                        self.stats.dropped_gops += 1;
                    }
                    _ => {}
                }
                TickOutcome::Rendered { diff, action }
            }
            SyncAction::Flush => {
                self.source.flush();
                self.output.flush();
                self.stats.flushes += 1;
                TickOutcome::Flushed { diff }
            }
            SyncAction::Seek => {
                let position = self.session.clock().current_time();
                self.source.seek_video(position);
                self.output.flush();
                self.stats.seeks += 1;
                TickOutcome::Seeked { diff, position }
            }
        }
    }

    fn present(&mut self, frame: &S::Frame, presentation_time: Option<Seconds>) {
        self.output.render(frame);
        if let Some(time) = presentation_time {
            self.source.set_video_time(time);
        }
        self.stats.rendered += 1;
    }

    fn idle(&mut self) -> TickOutcome {
        self.stats.idle += 1;
        self.output.idle();
        TickOutcome::Idle
    }

    /// Apply a command. Returns false for `Stop`.
    pub fn handle_command(&mut self, command: RenderCommand) -> bool {
        match command {
            RenderCommand::Play => {
                self.session.play();
            }
            RenderCommand::Pause => {
                self.session.pause();
            }
            RenderCommand::Seek(target) => {
                self.session.seek(target);
                self.source.seek_video(target);
                self.output.flush();
            }
            RenderCommand::ReadNextFrame => {
                self.tick(true);
            }
            RenderCommand::Stop => return false,
        }
        true
    }
}

impl<S, O> RenderLoop<S, O>
where
    S: FrameSource + 'static,
    O: VideoOutput<S::Frame> + 'static,
{
    /// Run the loop on its own thread, ticking every `refresh_interval`.
    pub fn spawn(self, refresh_interval: Duration) -> Result<RenderHandle<S, O>> {
        let (command_tx, command_rx) = channel::unbounded();
        let thread = thread::Builder::new()
            .name("playsync-render".into())
            .spawn(move || self.run(refresh_interval, command_rx))?;
        info!("render loop started, refresh every {:?}", refresh_interval);
        Ok(RenderHandle {
            command_tx,
            thread: Some(thread),
        })
    }

    /// Refresh interval for a stream at `fps`: twice the frame rate, capped
    /// at the fastest display refresh.
    pub fn refresh_interval(fps: f32) -> Duration {
        let rate = time::display_frame_rate(fps).max(1) as f64;
        time::to_duration((1.0 / rate).max(time::refresh_tolerance()))
    }

    fn run(mut self, refresh_interval: Duration, commands: Receiver<RenderCommand>) -> Self {
        let ticker = channel::tick(refresh_interval);
        loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(command) => {
                        debug!(?command, "render command");
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("render command channel closed");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    self.tick(false);
                }
            }
        }
        info!(stats = ?self.stats, "render loop stopped");
        self
    }
}

/// Control handle for a spawned render loop.
pub struct RenderHandle<S, O>
where
    S: FrameSource,
    O: VideoOutput<S::Frame>,
{
    command_tx: Sender<RenderCommand>,
    thread: Option<thread::JoinHandle<RenderLoop<S, O>>>,
}

impl<S, O> RenderHandle<S, O>
where
    S: FrameSource,
    O: VideoOutput<S::Frame>,
{
    pub fn send(&self, command: RenderCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| Error::Thread(format!("render loop is gone: {}", e)))
    }

    /// Stop the loop and hand it back.
    pub fn stop(mut self) -> Result<RenderLoop<S, O>> {
        // the loop may already have exited; joining reports that
        let _ = self.command_tx.send(RenderCommand::Stop);
        let thread = self
            .thread
            .take()
            .ok_or_else(|| Error::Thread("render loop already joined".into()))?;
        thread
            .join()
            .map_err(|_| Error::Thread("render thread panicked".into()))
    }
}

impl<S, O> Drop for RenderHandle<S, O>
where
    S: FrameSource,
    O: VideoOutput<S::Frame>,
{
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.command_tx.send(RenderCommand::Stop);
            let _ = thread.join();
        }
    }
}
