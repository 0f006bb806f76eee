//! Message transport
//!
//! A [`Messenger`] owns a [`Connector`] plus one receive buffer and one
//! reply buffer. Both buffers only grow. A receive that finds the sender
//! sent more than fits grows the receive buffer to the declared length and
//! reads the whole message again from offset zero, so the decoded length
//! always equals what the sender sent.

use crate::{Connector, TransportConfig, TransportError};
use core_types::{errno, ConnectionId, ReceiveId};
use ipc::{EncodingMode, MessageBuffer, MsgInfo, Payload, Pulse, SigEvent, SigVal, WireRecord};
use kernel_api::KernelApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a completed send returns
#[derive(Debug, Clone, PartialEq)]
pub struct SendReply {
    /// Status the server replied with
    pub status: i32,
    /// Reply length in bytes as received
    pub len: usize,
    /// Decoded reply
    pub payload: Payload,
}

impl SendReply {
    pub fn status_pair(&self) -> (i32, usize) {
        (self.status, self.len)
    }
}

/// One item taken off a channel
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A request from a blocked sender, who waits for a reply
    Message {
        rcvid: ReceiveId,
        /// Bytes received, equal to the sender's full length
        len: usize,
        payload: Payload,
        info: MsgInfo,
    },
    /// A pulse; nobody waits for a reply
    Pulse { pulse: Pulse, info: MsgInfo },
}

impl Received {
    /// Receive id; zero for pulses
    pub fn rcvid(&self) -> ReceiveId {
        match self {
            Received::Message { rcvid, .. } => *rcvid,
            Received::Pulse { .. } => ReceiveId::PULSE,
        }
    }

    pub fn is_pulse(&self) -> bool {
        matches!(self, Received::Pulse { .. })
    }

    pub fn info(&self) -> &MsgInfo {
        match self {
            Received::Message { info, .. } | Received::Pulse { info, .. } => info,
        }
    }

    /// Message payload; `None` for pulses
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Received::Message { payload, .. } => Some(payload),
            Received::Pulse { .. } => None,
        }
    }
}

/// Counters kept by the receive path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStats {
    pub messages: u64,
    pub pulses: u64,
    /// Messages that did not fit and were read again after growing
    pub rereads: u64,
}

/// Send, receive and reply over the handles of a [`Connector`]
pub struct Messenger<K: KernelApi> {
    connector: Connector<K>,
    config: TransportConfig,
    receive_buffer: MessageBuffer,
    reply_buffer: MessageBuffer,
    stats: ReceiveStats,
}

impl<K: KernelApi> Messenger<K> {
    pub fn new(kernel: Arc<K>, config: TransportConfig) -> Self {
        Self {
            connector: Connector::new(kernel),
            receive_buffer: MessageBuffer::with_len(config.receive_buffer_len),
            reply_buffer: MessageBuffer::with_len(config.reply_buffer_len),
            config,
            stats: ReceiveStats::default(),
        }
    }

    pub fn connector(&self) -> &Connector<K> {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut Connector<K> {
        &mut self.connector
    }

    pub fn kernel(&self) -> &Arc<K> {
        self.connector.kernel()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn encoding(&self) -> EncodingMode {
        self.config.encoding
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    pub fn receive_buffer(&self) -> &MessageBuffer {
        &self.receive_buffer
    }

    pub fn reply_buffer(&self) -> &MessageBuffer {
        &self.reply_buffer
    }

    /// Sends on the bound connection and waits for the reply
    ///
    /// The reply buffer grows to at least `reply_hint` first. Fails with
    /// [`TransportError::NoConnection`] without calling the kernel when no
    /// connection is bound.
    pub fn send(
        &mut self,
        payload: &Payload,
        reply_hint: usize,
        encoding: Option<EncodingMode>,
    ) -> Result<SendReply, TransportError> {
        let coid = self
            .connector
            .coid()
            .filter(|coid| coid.is_valid())
            .ok_or(TransportError::NoConnection)?;
        self.send_to(coid, payload, reply_hint, encoding)
    }

    /// Sends on an explicit connection and waits for the reply
    pub fn send_to(
        &mut self,
        coid: ConnectionId,
        payload: &Payload,
        reply_hint: usize,
        encoding: Option<EncodingMode>,
    ) -> Result<SendReply, TransportError> {
        if !coid.is_valid() {
            return Err(TransportError::NoConnection);
        }
        let mode = encoding.unwrap_or(self.config.encoding);
        let message = payload.encode(mode)?;
        self.reply_buffer.ensure(reply_hint);

        let outcome = self
            .connector
            .kernel()
            .msg_send(coid, &message, self.reply_buffer.as_mut_slice())?;
        let reply = Payload::decode(self.reply_buffer.head(outcome.reply_len), mode)?;
        log::trace!(
            "send on {}: {} bytes out, status {} with {} bytes back",
            coid,
            message.len(),
            outcome.status,
            outcome.reply_len
        );
        Ok(SendReply {
            status: outcome.status,
            len: outcome.reply_len,
            payload: reply,
        })
    }

    /// Blocks until a message or pulse arrives on the held channel
    ///
    /// A message whose body cannot be decoded is answered with `EBADMSG`
    /// before the error is returned, so the sender does not stay blocked.
    pub fn receive(
        &mut self,
        receive_hint: usize,
        encoding: Option<EncodingMode>,
    ) -> Result<Received, TransportError> {
        let Some(chid) = self.connector.chid() else {
            log::error!("receive called without a channel");
            return Err(TransportError::NoChannel);
        };
        let mode = encoding.unwrap_or(self.config.encoding);
        self.receive_buffer.ensure(receive_hint.max(Pulse::SIZE));

        let kernel = Arc::clone(self.connector.kernel());
        let (rcvid, mut info) = kernel.msg_receive(chid, self.receive_buffer.as_mut_slice())?;

        if rcvid.is_pulse() {
            let pulse = Pulse::read_from(self.receive_buffer.head(info.msglen))?;
            self.stats.pulses += 1;
            log::trace!("received {} on {}", pulse, chid);
            return Ok(Received::Pulse { pulse, info });
        }

        if info.srcmsglen > self.receive_buffer.capacity() {
            self.receive_buffer.ensure(info.srcmsglen);
            info.msglen = kernel.msg_read(rcvid, self.receive_buffer.as_mut_slice(), 0)?;
            self.stats.rereads += 1;
            log::debug!(
                "{}: grew receive buffer to {} bytes",
                rcvid,
                self.receive_buffer.capacity()
            );
        }

        let len = info.msglen;
        let payload = match Payload::decode(self.receive_buffer.head(len), mode) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("{}: undecodable {} body: {}", rcvid, mode, err);
                kernel.msg_error(rcvid, errno::EBADMSG)?;
                return Err(err.into());
            }
        };
        self.stats.messages += 1;
        Ok(Received::Message {
            rcvid,
            len,
            payload,
            info,
        })
    }

    /// Replies to a pending sender
    ///
    /// A missing payload sends an empty reply. In raw mode `len_override`
    /// caps the number of bytes sent.
    pub fn reply(
        &self,
        rcvid: ReceiveId,
        status: i32,
        payload: Option<&Payload>,
        len_override: Option<usize>,
    ) -> Result<(), TransportError> {
        self.reply_with(rcvid, status, payload, len_override, None)
    }

    /// Replies with an explicit encoding mode
    pub fn reply_with(
        &self,
        rcvid: ReceiveId,
        status: i32,
        payload: Option<&Payload>,
        len_override: Option<usize>,
        encoding: Option<EncodingMode>,
    ) -> Result<(), TransportError> {
        let mode = encoding.unwrap_or(self.config.encoding);
        let data = encode_reply(payload, len_override, mode)?;
        self.connector.kernel().msg_reply(rcvid, status, &data)?;
        Ok(())
    }

    /// Unblocks a pending sender with an error number
    pub fn error(&self, rcvid: ReceiveId, errno: i32) -> Result<(), TransportError> {
        self.connector.kernel().msg_error(rcvid, errno)?;
        Ok(())
    }

    /// Copies bytes of a pending message starting at `offset`
    pub fn read(&self, rcvid: ReceiveId, buf: &mut [u8], offset: usize) -> Result<usize, TransportError> {
        Ok(self.connector.kernel().msg_read(rcvid, buf, offset)?)
    }

    /// Sender information for a pending request
    pub fn info(&self, rcvid: ReceiveId) -> Result<MsgInfo, TransportError> {
        Ok(self.connector.kernel().msg_info(rcvid)?)
    }

    /// Sends a pulse on the bound connection
    pub fn send_pulse(&self, priority: i16, code: i8, value: SigVal) -> Result<(), TransportError> {
        let coid = self.connector.coid().ok_or(TransportError::NoConnection)?;
        self.send_pulse_to(coid, priority, code, value)
    }

    /// Sends a pulse on an explicit connection; never blocks
    pub fn send_pulse_to(
        &self,
        coid: ConnectionId,
        priority: i16,
        code: i8,
        value: SigVal,
    ) -> Result<(), TransportError> {
        self.connector
            .kernel()
            .msg_send_pulse(coid, priority, code, value)?;
        Ok(())
    }

    /// Delivers `event` on behalf of the sender of `rcvid`
    pub fn deliver_event(&self, event: &SigEvent, rcvid: ReceiveId) -> Result<(), TransportError> {
        self.connector.kernel().msg_deliver_event(rcvid, event)?;
        Ok(())
    }
}

fn encode_reply(
    payload: Option<&Payload>,
    len_override: Option<usize>,
    mode: EncodingMode,
) -> Result<Vec<u8>, TransportError> {
    let Some(payload) = payload else {
        return Ok(Vec::new());
    };
    let mut data = payload.encode(mode)?;
    if mode == EncodingMode::Raw {
        if let Some(len) = len_override {
            data.truncate(len);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::NameScope;
    use ipc::{pulse_code, StatRecord};
    use kernel_api::ChannelFlags;
    use serde_json::json;
    use sim_kernel::SimulatedKernel;
    use std::thread;

    fn server(kernel: &Arc<SimulatedKernel>, config: TransportConfig) -> Messenger<SimulatedKernel> {
        let mut server = Messenger::new(Arc::clone(kernel), config);
        server.connector_mut().attach_name("echo", NameScope::Local).unwrap();
        server
    }

    fn client(kernel: &Arc<SimulatedKernel>, config: TransportConfig) -> Messenger<SimulatedKernel> {
        let mut client = Messenger::new(Arc::clone(kernel), config);
        client.connector_mut().open_name("echo", NameScope::Local).unwrap();
        client
    }

    #[test]
    fn test_send_without_connection() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut messenger = Messenger::new(kernel, TransportConfig::raw());
        let err = messenger.send(&Payload::bytes("x"), 16, None).unwrap_err();
        assert!(matches!(err, TransportError::NoConnection));
        assert_eq!(err.status_pair(), (-1, 0));
    }

    #[test]
    fn test_receive_without_channel() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut messenger = Messenger::new(kernel, TransportConfig::raw());
        assert!(matches!(messenger.receive(64, None), Err(TransportError::NoChannel)));
    }

    #[test]
    fn test_raw_round_trip() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server = server(&kernel, TransportConfig::raw());
        let mut client = client(&kernel, TransportConfig::raw());

        let handle = thread::spawn(move || client.send(&Payload::bytes("ping"), 16, None).unwrap());

        let received = server.receive(64, None).unwrap();
        let Received::Message { rcvid, len, payload, .. } = received else {
            panic!("expected a message");
        };
        assert_eq!(len, 4);
        assert_eq!(payload, Payload::bytes("ping"));
        server.reply(rcvid, 0, Some(&Payload::bytes("pong")), None).unwrap();

        let reply = handle.join().unwrap();
        assert_eq!(reply.status_pair(), (0, 4));
        assert_eq!(reply.payload, Payload::bytes("pong"));
    }

    #[test]
    fn test_structured_round_trip() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server = server(&kernel, TransportConfig::structured());
        let mut client = client(&kernel, TransportConfig::structured());

        let request = Payload::from(json!({"op": "stat", "id": 7}));
        let handle = thread::spawn(move || client.send(&request, 64, None).unwrap());

        let received = server.receive(64, None).unwrap();
        assert_eq!(
            received.payload().and_then(|p| p.value()),
            Some(&json!({"op": "stat", "id": 7}))
        );
        let reply = Payload::from(json!({"size": 1024}));
        server.reply(received.rcvid(), 0, Some(&reply), None).unwrap();

        let reply = handle.join().unwrap();
        assert_eq!(reply.status, 0);
        assert_eq!(reply.payload.value(), Some(&json!({"size": 1024})));
        assert_eq!(reply.len, br#"{"size":1024}"#.len());
    }

    #[test]
    fn test_oversized_message_reread_once() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server = server(&kernel, TransportConfig::raw().with_receive_buffer_len(32));
        let mut client = client(&kernel, TransportConfig::raw());
        let message: Vec<u8> = (0..200u8).collect();
        let sent = message.clone();

        let handle = thread::spawn(move || client.send(&Payload::bytes(sent), 0, None).unwrap());

        let received = server.receive(0, None).unwrap();
        let Received::Message { rcvid, len, payload, .. } = received else {
            panic!("expected a message");
        };
        assert_eq!(len, 200);
        assert_eq!(payload, Payload::bytes(message));
        assert_eq!(server.stats().rereads, 1);
        assert_eq!(server.receive_buffer().reallocations(), 1);
        assert_eq!(server.receive_buffer().capacity(), 200);

        server.reply(rcvid, 0, None, None).unwrap();
        assert_eq!(handle.join().unwrap().status_pair(), (0, 0));
    }

    #[test]
    fn test_buffers_only_grow() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut messenger = Messenger::new(kernel, TransportConfig::raw());
        let chid = messenger
            .connector_mut()
            .create_channel(ChannelFlags::empty())
            .unwrap();
        let coid = messenger
            .kernel()
            .connect_attach(core_types::NodeDescriptor::LOCAL, messenger.kernel().pid(), chid, 0, 0)
            .unwrap();
        messenger.send_pulse_to(coid, 10, 1, SigVal::Int(0)).unwrap();
        messenger.send_pulse_to(coid, 10, 2, SigVal::Int(0)).unwrap();

        messenger.receive(4096, None).unwrap();
        assert_eq!(messenger.receive_buffer().capacity(), 4096);
        messenger.receive(16, None).unwrap();
        assert_eq!(messenger.receive_buffer().capacity(), 4096);
    }

    #[test]
    fn test_pulse_is_not_a_message() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server = server(&kernel, TransportConfig::structured());
        let client = client(&kernel, TransportConfig::structured());

        client.send_pulse(10, 9, SigVal::Int(3)).unwrap();
        let received = server.receive(0, None).unwrap();
        assert!(received.is_pulse());
        assert_eq!(received.rcvid(), ReceiveId::PULSE);
        assert!(received.payload().is_none());
        let Received::Pulse { pulse, .. } = received else {
            panic!("expected a pulse");
        };
        assert_eq!(pulse.code, 9);
        assert_eq!(server.stats().pulses, 1);
    }

    #[test]
    fn test_close_produces_disconnect_pulse() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server = server(&kernel, TransportConfig::raw());
        let mut client = client(&kernel, TransportConfig::raw());
        client.connector_mut().close().unwrap();

        let Received::Pulse { pulse, .. } = server.receive(0, None).unwrap() else {
            panic!("expected a pulse");
        };
        assert_eq!(pulse.code, pulse_code::DISCONNECT);
    }

    #[test]
    fn test_raw_record_reply_respects_override() {
        let record = StatRecord {
            size: 9,
            ..StatRecord::default()
        };
        let payload = Payload::record(&record);
        let full = encode_reply(Some(&payload), None, EncodingMode::Raw).unwrap();
        assert_eq!(full.len(), StatRecord::SIZE);
        let short = encode_reply(Some(&payload), Some(16), EncodingMode::Raw).unwrap();
        assert_eq!(short.len(), 16);
        assert!(encode_reply(None, None, EncodingMode::Structured)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_structured_value_rejected_in_raw_reply() {
        let payload = Payload::from(json!({"a": 1}));
        assert!(matches!(
            encode_reply(Some(&payload), None, EncodingMode::Raw),
            Err(TransportError::Payload(ipc::PayloadError::StructuredInRawMode))
        ));
    }

    #[test]
    fn test_undecodable_body_gets_error_reply() {
        let kernel = Arc::new(SimulatedKernel::new());
        let mut server = server(&kernel, TransportConfig::structured());
        let mut client = client(&kernel, TransportConfig::raw());

        let handle = thread::spawn(move || client.send(&Payload::bytes("not json"), 0, None));
        assert!(matches!(
            server.receive(0, None),
            Err(TransportError::Payload(_))
        ));
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.errno(), errno::EBADMSG);
    }
}
