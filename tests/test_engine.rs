//! Protocol-engine scenarios driven through a scripted message port.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use alpc_rpc::error::{AlpcRpcError, Result};
use alpc_rpc::ndr::{
    ConformantVaryingPointerArray, ContextHandle, Guid, MarshallBuffer, NdrPrimitive,
    NdrUniquePointer, TransferSyntax,
};
use alpc_rpc::port::{MessagePort, PortReply};
use alpc_rpc::rpc::epmapper::{self, EpmTower};
use alpc_rpc::rpc::message::{BIND_MESSAGE_SIZE, RESPONSE_MESSAGE_SIZE};
use alpc_rpc::rpc::{
    CALL_ID_SENTINEL, DCE_NDR_TRANSFER_SYNTAX, EPMAPPER_INTERFACE, RpcClientPort, SyntaxId,
    bind_to_interface, call_method,
};
use pretty_assertions::assert_eq;

thread_local! {
    /// Scripted replies per port name; each connect pops one script.
    static PORT_SCRIPTS: RefCell<HashMap<String, VecDeque<Vec<PortReply>>>> =
        RefCell::new(HashMap::new());
}

struct MockPort {
    replies: RefCell<VecDeque<PortReply>>,
    sent: RefCell<Vec<Vec<u8>>>,
}

impl MockPort {
    fn with_replies(replies: Vec<PortReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn register(port_name: &str, replies: Vec<PortReply>) {
        PORT_SCRIPTS.with(|scripts| {
            scripts
                .borrow_mut()
                .entry(port_name.to_owned())
                .or_default()
                .push_back(replies);
        });
    }

    fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }
}

impl MessagePort for MockPort {
    fn connect(port_name: &str) -> Result<Self> {
        PORT_SCRIPTS
            .with(|scripts| {
                scripts
                    .borrow_mut()
                    .get_mut(port_name)
                    .and_then(VecDeque::pop_front)
            })
            .map(Self::with_replies)
            .ok_or(AlpcRpcError::ConnectionRefused)
    }

    fn send_receive(&self, input: &[u8]) -> Result<PortReply> {
        self.sent.borrow_mut().push(input.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or(AlpcRpcError::PortDisconnected)
    }

    fn disconnect(&self) {}
}

fn test_interface() -> SyntaxId {
    SyntaxId::new(Guid::from_u128(0xf6beaff7_1e19_4fbb_9f8f_b89e2018337c), 1, 0)
}

fn bind_reply(binding_status: u32) -> PortReply {
    let mut data = vec![0u8; BIND_MESSAGE_SIZE];
    data[0] = 0x01;
    data[8..12].copy_from_slice(&binding_status.to_le_bytes());
    PortReply { data, view: None }
}

fn response_reply(flags: u32, call_id: u32, body: &[u8]) -> PortReply {
    let mut data = vec![0u8; RESPONSE_MESSAGE_SIZE];
    data[0] = 0x03;
    data[8..12].copy_from_slice(&flags.to_le_bytes());
    data[12..16].copy_from_slice(&call_id.to_le_bytes());
    data.extend_from_slice(body);
    PortReply { data, view: None }
}

fn fault_reply(rpc_status: u32) -> PortReply {
    let mut data = vec![0u8; 16];
    data[0] = 0x02;
    data[8..12].copy_from_slice(&rpc_status.to_le_bytes());
    PortReply { data, view: None }
}

#[test]
fn test_bind_sends_a_bind_frame_and_allocates_an_id() {
    let port = MockPort::with_replies(vec![bind_reply(0)]);
    let bind_id =
        bind_to_interface(&port, &test_interface(), TransferSyntax::Ndr64).expect("bind");
    assert_ne!(bind_id, 0);

    let frames = port.sent_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), BIND_MESSAGE_SIZE);
    assert_eq!(frames[0][0], 0x01);
    // The NDR64 slot carries the allocated id.
    assert_eq!(
        u16::from_le_bytes([frames[0][38], frames[0][39]]),
        bind_id
    );
}

#[test]
fn test_binding_ids_increase_within_a_process() {
    let port = MockPort::with_replies(vec![bind_reply(0), bind_reply(0)]);
    let first = bind_to_interface(&port, &test_interface(), TransferSyntax::Dce).expect("bind");
    let second = bind_to_interface(&port, &test_interface(), TransferSyntax::Dce).expect("bind");
    assert!(second > first);
}

#[test]
fn test_rejected_bind_is_a_refused_connection() {
    let port = MockPort::with_replies(vec![bind_reply(0xC002_0002)]);
    assert_eq!(
        bind_to_interface(&port, &test_interface(), TransferSyntax::Ndr64),
        Err(AlpcRpcError::ConnectionRefused)
    );
}

#[test]
fn test_garbage_bind_reply_is_invalid() {
    let port = MockPort::with_replies(vec![PortReply {
        data: vec![0xFF; 8],
        view: None,
    }]);
    assert_eq!(
        bind_to_interface(&port, &test_interface(), TransferSyntax::Ndr64),
        Err(AlpcRpcError::InvalidMessage)
    );
}

#[test]
fn test_call_round_trip_with_inline_out_arguments() {
    let mut body = MarshallBuffer::new(TransferSyntax::Dce);
    body.marshall(&NdrPrimitive::from(0xCAFEBABEu32));
    body.status().expect("body");

    let port = MockPort::with_replies(vec![response_reply(0, CALL_ID_SENTINEL, body.bytes())]);

    let mut input = MarshallBuffer::new(TransferSyntax::Dce);
    input.marshall(&NdrPrimitive::from(0x42u32));
    let mut output = MarshallBuffer::new(TransferSyntax::Dce);

    call_method(&port, 9, test_interface().guid, 6, &input, &mut output).expect("call");

    let mut out_value = NdrPrimitive::<u32>::default();
    output.unmarshall(&mut out_value);
    output.status().expect("unmarshall");
    assert_eq!(out_value.value(), 0xCAFEBABE);

    // The request frame carries the header and then the in-arguments.
    let frames = port.sent_frames();
    assert_eq!(frames[0].len(), 64 + 4);
    assert_eq!(&frames[0][12..16], &CALL_ID_SENTINEL.to_le_bytes());
    assert_eq!(&frames[0][20..24], &6u32.to_le_bytes());
    assert_eq!(&frames[0][64..68], &0x42u32.to_le_bytes());
}

#[test]
fn test_call_prefers_the_view_payload_when_flagged() {
    let mut body = MarshallBuffer::new(TransferSyntax::Dce);
    body.marshall(&NdrPrimitive::from(0x55AA55AAu32));
    body.status().expect("body");

    let mut reply = response_reply(0x4, CALL_ID_SENTINEL, &[0xFF; 8]);
    reply.view = Some(body.bytes().to_vec());
    let port = MockPort::with_replies(vec![reply]);

    let input = MarshallBuffer::new(TransferSyntax::Dce);
    let mut output = MarshallBuffer::new(TransferSyntax::Dce);
    call_method(&port, 1, test_interface().guid, 0, &input, &mut output).expect("call");

    let mut out_value = NdrPrimitive::<u32>::default();
    output.unmarshall(&mut out_value);
    output.status().expect("unmarshall");
    assert_eq!(out_value.value(), 0x55AA55AA);
}

#[test]
fn test_fault_replies_map_to_fault_received() {
    let port = MockPort::with_replies(vec![fault_reply(0x06D1)]);

    let input = MarshallBuffer::new(TransferSyntax::Dce);
    let mut output = MarshallBuffer::new(TransferSyntax::Dce);
    assert_eq!(
        call_method(&port, 1, test_interface().guid, 0, &input, &mut output),
        Err(AlpcRpcError::FaultReceived(0x06D1))
    );
}

#[test]
fn test_mismatched_call_id_is_invalid() {
    let port = MockPort::with_replies(vec![response_reply(0, 0x1234_5678, &[])]);

    let input = MarshallBuffer::new(TransferSyntax::Dce);
    let mut output = MarshallBuffer::new(TransferSyntax::Dce);
    assert_eq!(
        call_method(&port, 1, test_interface().guid, 0, &input, &mut output),
        Err(AlpcRpcError::InvalidMessage)
    );
}

#[test]
fn test_poisoned_input_never_reaches_the_port() {
    let port = MockPort::with_replies(vec![]);

    let mut input = MarshallBuffer::with_flags(7);
    let mut output = MarshallBuffer::new(TransferSyntax::Dce);
    assert_eq!(
        call_method(&port, 1, test_interface().guid, 0, &input, &mut output),
        Err(AlpcRpcError::UnknownTransferSyntax(7))
    );
    input.marshall_raw(&[0]);
    assert!(port.sent_frames().is_empty());
}

#[test]
fn test_connect_to_port_falls_back_from_ndr64_to_dce() {
    // The first connection refuses the NDR64 bind, the retry accepts DCE.
    MockPort::register("\\RPC Control\\ntsvcs", vec![bind_reply(0xC002_0002)]);
    MockPort::register("\\RPC Control\\ntsvcs", vec![bind_reply(0)]);

    let client =
        RpcClientPort::<MockPort>::connect_to_port("\\RPC Control\\ntsvcs", &test_interface())
            .expect("connect");
    assert_eq!(client.transfer_syntax(), TransferSyntax::Dce);
}

#[test]
fn test_unknown_port_name_refuses_the_connection() {
    assert_eq!(
        RpcClientPort::<MockPort>::connect_to_port_with_syntax(
            "\\RPC Control\\no-such-port",
            &test_interface(),
            TransferSyntax::Dce,
        )
        .err(),
        Some(AlpcRpcError::ConnectionRefused)
    );
}

/// A reply tower whose named-pipe floor names `endpoint`.
fn reply_tower(endpoint: &[u8]) -> EpmTower {
    let request = EpmTower::for_interface(&test_interface(), &DCE_NDR_TRANSFER_SYNTAX);
    let mut octets = request.octets()[..62].to_vec();
    octets.extend_from_slice(&(endpoint.len() as u16).to_le_bytes());
    octets.extend_from_slice(endpoint);
    EpmTower::from_octets(octets)
}

#[test]
fn test_endpoint_mapper_walk_binds_the_first_live_endpoint() {
    // ept_map out-arguments: entry handle, tower count, tower array and
    // the mapper's own status.
    let towers: ConformantVaryingPointerArray<EpmTower> =
        ConformantVaryingPointerArray::new(vec![Some(reply_tower(b"LRPC-eventlog\0"))]);

    let mut out_arguments = MarshallBuffer::new(TransferSyntax::Dce);
    out_arguments
        .marshall(&NdrPrimitive::from(ContextHandle::default()))
        .marshall(&NdrPrimitive::from(1u32))
        .marshall(&towers)
        .marshall(&NdrPrimitive::from(0u32));
    out_arguments.status().expect("out arguments");

    MockPort::register(
        "\\RPC Control\\epmapper",
        vec![
            bind_reply(0),
            response_reply(0, CALL_ID_SENTINEL, out_arguments.bytes()),
        ],
    );
    MockPort::register("\\RPC Control\\LRPC-eventlog", vec![bind_reply(0)]);

    let (_, bind_id) = epmapper::find_endpoint_and_connect::<MockPort>(
        &test_interface(),
        TransferSyntax::Dce,
    )
    .expect("endpoint walk");
    assert_ne!(bind_id, 0);
}

#[test]
fn test_endpoint_mapper_with_no_usable_endpoint_is_refused() {
    let towers: ConformantVaryingPointerArray<EpmTower> =
        ConformantVaryingPointerArray::new(vec![Some(reply_tower(b"LRPC-unreachable\0"))]);

    let mut out_arguments = MarshallBuffer::new(TransferSyntax::Dce);
    out_arguments
        .marshall(&NdrPrimitive::from(ContextHandle::default()))
        .marshall(&NdrPrimitive::from(1u32))
        .marshall(&towers)
        .marshall(&NdrPrimitive::from(0u32));
    out_arguments.status().expect("out arguments");

    MockPort::register(
        "\\RPC Control\\epmapper",
        vec![
            bind_reply(0),
            response_reply(0, CALL_ID_SENTINEL, out_arguments.bytes()),
        ],
    );
    // LRPC-unreachable is never registered, so its connect fails.

    assert_eq!(
        epmapper::find_endpoint_and_connect::<MockPort>(&test_interface(), TransferSyntax::Dce)
            .err(),
        Some(AlpcRpcError::ConnectionRefused)
    );
}

#[test]
fn test_mapper_error_status_refuses_the_lookup() {
    let towers: ConformantVaryingPointerArray<EpmTower> =
        ConformantVaryingPointerArray::new(vec![Some(reply_tower(b"LRPC-eventlog\0"))]);

    let mut out_arguments = MarshallBuffer::new(TransferSyntax::Dce);
    out_arguments
        .marshall(&NdrPrimitive::from(ContextHandle::default()))
        .marshall(&NdrPrimitive::from(1u32))
        .marshall(&towers)
        .marshall(&NdrPrimitive::from(0x16C9A0D6u32)); // EPT_S_NOT_REGISTERED
    out_arguments.status().expect("out arguments");

    MockPort::register(
        "\\RPC Control\\epmapper",
        vec![
            bind_reply(0),
            response_reply(0, CALL_ID_SENTINEL, out_arguments.bytes()),
        ],
    );

    assert_eq!(
        epmapper::find_endpoint_and_connect::<MockPort>(&test_interface(), TransferSyntax::Dce)
            .err(),
        Some(AlpcRpcError::ConnectionRefused)
    );
}

// Referenced so the unique-pointer import is exercised the way the mapper
// marshals its object parameter.
#[test]
fn test_mapper_object_parameter_shape() {
    let object = NdrUniquePointer::new(NdrPrimitive::from(EPMAPPER_INTERFACE.guid));
    let mut buffer = MarshallBuffer::new(TransferSyntax::Dce);
    buffer.marshall(&object);
    buffer.status().expect("marshall");
    // Referent word plus the 16 GUID bytes.
    assert_eq!(buffer.bytes().len(), 20);
}
