//! midir backend: one dedicated thread per open device.
//!
//! midir connections are not `Send` on every platform, so each device gets
//! a worker thread that builds its input and output connections in place and
//! then serves write/close commands over a channel. Input arrives on midir's
//! own callback thread and goes straight to the dispatcher.

use crossbeam_channel::{bounded, Receiver, Sender};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::connection::{ConnectionId, PushTransport, RawOutput};
use crate::error::{NativeError, NativeErrorKind, NativeResult};
use crate::ingest::Dispatcher;
use crate::sequencer::{
    ClientRecord, PortCaps, PortKind, PortRecord, Sequencer, SequencerSession, SnapshotSession,
};

enum MidirCommand {
    Write(Vec<u8>, Sender<NativeResult<usize>>),
    Close(Sender<NativeResult<()>>),
}

#[derive(Debug, Clone)]
pub struct MidirTransport {
    client_name: String,
}

impl MidirTransport {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl PushTransport for MidirTransport {
    type Connection = MidirConnection;

    fn open(
        &self,
        name: &str,
        id: ConnectionId,
        dispatcher: Dispatcher,
    ) -> NativeResult<MidirConnection> {
        let (command_sender, command_receiver) = bounded(64);
        let (ready_sender, ready_receiver) = bounded(1);
        let client_name = self.client_name.clone();
        let device_name = name.to_string();

        let worker = thread::Builder::new()
            .name(format!("seqmidi-midir-{}", id.raw()))
            .spawn(move || {
                midir_thread(
                    client_name,
                    device_name,
                    id,
                    dispatcher,
                    command_receiver,
                    ready_sender,
                )
            })?;

        match ready_receiver.recv() {
            Ok(Ok(())) => Ok(MidirConnection {
                command_sender,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(NativeError::new(
                NativeErrorKind::Unknown,
                "MIDI worker thread exited during open",
            )),
        }
    }
}

fn midir_thread(
    client_name: String,
    device_name: String,
    id: ConnectionId,
    dispatcher: Dispatcher,
    command_receiver: Receiver<MidirCommand>,
    ready_sender: Sender<NativeResult<()>>,
) {
    let (mut input, mut output) = match connect(&client_name, &device_name, id, dispatcher) {
        Ok(connections) => connections,
        Err(e) => {
            let _ = ready_sender.send(Err(e));
            return;
        }
    };
    let _ = ready_sender.send(Ok(()));

    for command in command_receiver.iter() {
        match command {
            MidirCommand::Write(bytes, reply) => {
                let result = match output.as_mut() {
                    Some(conn) => conn
                        .send(&bytes)
                        .map(|()| bytes.len())
                        .map_err(NativeError::from),
                    None => Err(NativeError::new(
                        NativeErrorKind::InvalidArgument,
                        format!("'{device_name}' has no output port"),
                    )),
                };
                let _ = reply.send(result);
            }
            MidirCommand::Close(reply) => {
                if let Some(conn) = input.take() {
                    conn.close();
                }
                if let Some(conn) = output.take() {
                    conn.close();
                }
                let _ = reply.send(Ok(()));
                break;
            }
        }
    }
    debug!("midir worker for {} exiting", id);
}

type Connections = (Option<MidiInputConnection<()>>, Option<MidiOutputConnection>);

fn connect(
    client_name: &str,
    device_name: &str,
    id: ConnectionId,
    dispatcher: Dispatcher,
) -> NativeResult<Connections> {
    let midi_in = MidiInput::new(client_name)?;
    let in_ports = midi_in.ports();
    let in_names: Vec<String> = in_ports
        .iter()
        .map(|p| midi_in.port_name(p).unwrap_or_default())
        .collect();
    let input = match match_port(&in_names, device_name) {
        Some(index) => {
            let conn = midi_in.connect(
                &in_ports[index],
                &format!("{client_name}-in"),
                move |_stamp, message, _| {
                    dispatcher.dispatch(id, message);
                },
                (),
            )?;
            Some(conn)
        }
        None => None,
    };

    let midi_out = MidiOutput::new(client_name)?;
    let out_ports = midi_out.ports();
    let out_names: Vec<String> = out_ports
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_default())
        .collect();
    let output = match match_port(&out_names, device_name) {
        Some(index) => Some(midi_out.connect(&out_ports[index], &format!("{client_name}-out"))?),
        None => None,
    };

    if input.is_none() && output.is_none() {
        return Err(NativeError::new(
            NativeErrorKind::NoSuchDevice,
            format!("no MIDI port matching '{device_name}'"),
        ));
    }
    Ok((input, output))
}

/// Exact name first, then case-insensitive substring.
fn match_port(names: &[String], wanted: &str) -> Option<usize> {
    if let Some(index) = names.iter().position(|n| n == wanted) {
        return Some(index);
    }
    let wanted = wanted.to_lowercase();
    names
        .iter()
        .position(|n| !n.is_empty() && n.to_lowercase().contains(&wanted))
}

/// Handle to a device's worker thread.
pub struct MidirConnection {
    command_sender: Sender<MidirCommand>,
    worker: Option<JoinHandle<()>>,
}

fn worker_gone() -> NativeError {
    NativeError::new(NativeErrorKind::Disconnected, "MIDI worker thread not running")
}

impl RawOutput for MidirConnection {
    fn write(&mut self, bytes: &[u8]) -> NativeResult<usize> {
        let (reply_sender, reply_receiver) = bounded(1);
        self.command_sender
            .send(MidirCommand::Write(bytes.to_vec(), reply_sender))
            .map_err(|_| worker_gone())?;
        reply_receiver.recv().map_err(|_| worker_gone())?
    }

    fn close(mut self) -> NativeResult<()> {
        let (reply_sender, reply_receiver) = bounded(1);
        let result = self
            .command_sender
            .send(MidirCommand::Close(reply_sender))
            .map_err(|_| worker_gone())
            .and_then(|()| reply_receiver.recv().map_err(|_| worker_gone())?);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("midir worker thread panicked");
            }
        }
        result
    }
}

/// Enumerates midir ports, one synthetic client per distinct port name.
///
/// midir has no client/port graph, so a name seen as both an input and an
/// output becomes a duplex port. Clients are numbered from 1; there is no
/// card index.
#[derive(Debug, Clone)]
pub struct MidirSequencer {
    client_name: String,
}

impl MidirSequencer {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl Sequencer for MidirSequencer {
    fn open_session(&self) -> NativeResult<Box<dyn SequencerSession + '_>> {
        let midi_in = MidiInput::new(&format!("{}-list", self.client_name))?;
        let midi_out = MidiOutput::new(&format!("{}-list", self.client_name))?;

        let mut inputs = Vec::new();
        for port in midi_in.ports() {
            match midi_in.port_name(&port) {
                Ok(name) => inputs.push(name),
                Err(e) => warn!("Ignoring unreadable midir input port: {}", e),
            }
        }
        let mut outputs = Vec::new();
        for port in midi_out.ports() {
            match midi_out.port_name(&port) {
                Ok(name) => outputs.push(name),
                Err(e) => warn!("Ignoring unreadable midir output port: {}", e),
            }
        }

        Ok(Box::new(synthesize_session(&inputs, &outputs)))
    }
}

fn synthesize_session(inputs: &[String], outputs: &[String]) -> SnapshotSession {
    let mut names: Vec<&String> = Vec::new();
    for name in inputs.iter().chain(outputs) {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut session = SnapshotSession::new();
    for (index, name) in names.into_iter().enumerate() {
        let client = index as i32 + 1;
        let caps = match (inputs.contains(name), outputs.contains(name)) {
            (true, true) => {
                PortCaps::DUPLEX
                    | PortCaps::READ
                    | PortCaps::WRITE
                    | PortCaps::SUBS_READ
                    | PortCaps::SUBS_WRITE
            }
            (true, false) => PortCaps::READ | PortCaps::SUBS_READ,
            _ => PortCaps::WRITE | PortCaps::SUBS_WRITE,
        };
        session.push_client(ClientRecord {
            client,
            name: name.clone(),
            card: None,
        });
        session.push_port(
            client,
            Ok(PortRecord::new(0, name.clone(), PortKind::MIDI_GENERIC, caps)),
        );
    }
    session
}
