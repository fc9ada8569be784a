//! Line-oriented control protocol.
//!
//! One request per line, `<command> [argument]`, answered by one JSON
//! line:
//!
//! | command    | argument               | reply                    |
//! |------------|------------------------|--------------------------|
//! | `status`   |                        | status object            |
//! | `steps`    |                        | `{"steps":[...]}`        |
//! | `export`   |                        | `{"config":..,"steps":..}` |
//! | `import`   | envelope               | ok                       |
//! | `set`      | `{"steps":[...]}`      | ok                       |
//! | `add`      | step                   | `{"ok":true,"index":i}`  |
//! | `insert`   | `i step`               | ok                       |
//! | `up`/`down`| `i`                    | ok                       |
//! | `del`      | `i`                    | ok                       |
//! | `clear`    |                        | ok                       |
//! | `config`   | partial config or none | ok / current config      |
//! | `run`      |                        | ok                       |
//! | `loop`     | `n` (0 = forever)      | ok                       |
//! | `stop`     |                        | ok                       |
//! | `pos`      |                        | `{"x":..,"y":..}`        |
//! | `capture`  | seconds (default 3)    | `{"x":..,"y":..}`        |
//! | `tap-here` | `{"btn","delayMs","capture"}` | `{"ok":true,"index":i}` |
//!
//! Failures answer `{"error":"<code>"}` (see [`Error::code`]). Every request
//! that changes the macro or the configuration is followed by a save.

pub mod wire;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::{PEER_CAPTURE_DEFAULT_DELAY_S, PEER_CAPTURE_MAX_DELAY_S};
use crate::engine::{ConfigPatch, Direction, Engine};
use crate::error::Error;
use crate::peer::PeerPosition;
use crate::persist::Persistence;

use wire::{
    from_str, parse_step, to_slice, Added, Envelope, ErrorReply, ExportReply, SetSteps,
    StepsOut, StepsReply, TapHere, OK,
};

/// Serves control requests against an [`Engine`].
pub struct Control<'a, M: RawMutex, P, Q> {
    engine: &'a Engine<M>,
    persist: P,
    peer: Q,
}

impl<'a, M, P, Q> Control<'a, M, P, Q>
where
    M: RawMutex,
    P: Persistence,
    Q: PeerPosition,
{
    pub fn new(engine: &'a Engine<M>, persist: P, peer: Q) -> Self {
        Self {
            engine,
            persist,
            peer,
        }
    }

    /// Handle one request line, writing the JSON reply into `out`.
    ///
    /// Returns the reply length; 0 only if `out` cannot even hold an error
    /// reply.
    pub async fn handle_line(&mut self, line: &str, out: &mut [u8]) -> usize {
        match self.dispatch(line.trim(), out).await {
            Ok(n) => n,
            Err(e) => {
                warn!("control: request failed: {}", e);
                to_slice(&ErrorReply { error: e.code() }, out).unwrap_or(0)
            }
        }
    }

    async fn dispatch(&mut self, line: &str, out: &mut [u8]) -> Result<usize, Error> {
        let engine = self.engine;
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        debug!("control: {}", command);

        match command {
            "status" => to_slice(&engine.status().await, out),
            "steps" => {
                let steps = engine.lock_steps().await;
                let reply = StepsReply {
                    steps: StepsOut(steps.as_slice()),
                };
                to_slice(&reply, out)
            }
            "export" => {
                let config = engine.config().await;
                let steps = engine.lock_steps().await;
                let reply = ExportReply {
                    config: &config,
                    steps: StepsOut(steps.as_slice()),
                };
                to_slice(&reply, out)
            }
            "import" => {
                let dropped = engine
                    .rewrite(|config, steps| {
                        // Parse everything before touching anything.
                        let envelope: Envelope = from_str(arg)?;
                        if let Some(patch) = &envelope.config {
                            config.apply(patch);
                        }
                        let list = envelope.steps.unwrap_or_default();
                        *steps = list.steps;
                        Ok(list.dropped)
                    })
                    .await?;
                info!("control: imported, {} dropped", dropped);
                self.save().await?;
                to_slice(&OK, out)
            }
            "set" => {
                engine
                    .rewrite(|_, steps| {
                        let request: SetSteps = from_str(arg)?;
                        *steps = request.steps.unwrap_or_default().steps;
                        Ok(())
                    })
                    .await?;
                self.save().await?;
                to_slice(&OK, out)
            }
            "add" => {
                let index = engine.add(parse_step(arg)?).await?;
                self.save().await?;
                to_slice(&Added { ok: true, index }, out)
            }
            "insert" => {
                let (index, step) = arg
                    .split_once(char::is_whitespace)
                    .ok_or(Error::MalformedInput)?;
                engine
                    .insert(parse_index(index)?, parse_step(step.trim())?)
                    .await?;
                self.save().await?;
                to_slice(&OK, out)
            }
            "up" | "down" => {
                let direction = if command == "up" {
                    Direction::Up
                } else {
                    Direction::Down
                };
                engine.move_step(parse_index(arg)?, direction).await?;
                self.save().await?;
                to_slice(&OK, out)
            }
            "del" => {
                engine.delete(parse_index(arg)?).await?;
                self.save().await?;
                to_slice(&OK, out)
            }
            "clear" => {
                engine.clear().await?;
                self.save().await?;
                to_slice(&OK, out)
            }
            "config" if arg.is_empty() => to_slice(&engine.config().await, out),
            "config" => {
                let patch: ConfigPatch = from_str(arg)?;
                engine.update_config(&patch).await;
                self.save().await?;
                to_slice(&OK, out)
            }
            "run" => {
                engine.start_once()?;
                info!("control: run once");
                to_slice(&OK, out)
            }
            "loop" => {
                let n = parse_count(arg)?;
                engine.start_loop(n)?;
                info!("control: loop {}", n);
                to_slice(&OK, out)
            }
            "stop" => {
                engine.stop();
                info!("control: stop");
                to_slice(&OK, out)
            }
            "pos" => {
                let at = self.peer.position(None).await?;
                to_slice(&at, out)
            }
            "capture" => {
                let delay = parse_capture_delay(arg)?;
                let at = self.peer.position(Some(delay)).await?;
                to_slice(&at, out)
            }
            "tap-here" => {
                let request: TapHere = if arg.is_empty() {
                    TapHere::default()
                } else {
                    from_str(arg)?
                };
                let capture = request.capture.map(|s| s.min(PEER_CAPTURE_MAX_DELAY_S));
                let at = self.peer.position(capture).await?;
                let index = engine.add(request.into_step(at)).await?;
                self.save().await?;
                to_slice(&Added { ok: true, index }, out)
            }
            _ => Err(Error::MalformedInput),
        }
    }

    async fn save(&mut self) -> Result<(), Error> {
        let engine = self.engine;
        let config = engine.config().await;
        let steps = engine.lock_steps().await;
        self.persist
            .save(&config, steps.as_slice())
            .await
            .inspect_err(|e| error!("control: save failed: {}", e))
    }
}

fn parse_int(arg: &str) -> Result<i64, Error> {
    arg.trim().parse().map_err(|_| Error::MalformedInput)
}

fn parse_index(arg: &str) -> Result<usize, Error> {
    usize::try_from(parse_int(arg)?).map_err(|_| Error::InvalidIndex)
}

/// Loop count: missing means forever, negative counts as 0.
fn parse_count(arg: &str) -> Result<u32, Error> {
    if arg.is_empty() {
        return Ok(0);
    }
    Ok(parse_int(arg)?.clamp(0, u32::MAX as i64) as u32)
}

fn parse_capture_delay(arg: &str) -> Result<u8, Error> {
    if arg.is_empty() {
        return Ok(PEER_CAPTURE_DEFAULT_DELAY_S);
    }
    Ok(parse_int(arg)?.clamp(0, PEER_CAPTURE_MAX_DELAY_S as i64) as u8)
}
