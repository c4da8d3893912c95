use alpc_rpc::AlpcRpcError;
use alpc_rpc::ndr::{Guid, TransferSyntax};
use alpc_rpc::rpc::message::{
    BIND_MESSAGE_SIZE, BindMessage, MESSAGE_TYPE_BIND, REQUEST_MESSAGE_SIZE, RequestFlags,
    RequestMessage, ResponseFlags, ResponseMessage,
};
use alpc_rpc::rpc::SyntaxId;
use pretty_assertions::assert_eq;

fn fabricated_interface() -> SyntaxId {
    SyntaxId::new(
        Guid::from_u128(0x00112233_4455_6677_8899_aabbccddeeff),
        1,
        2,
    )
}

#[test]
fn test_ndr64_bind_frame_layout() {
    let message = BindMessage {
        interface: fabricated_interface(),
        syntax: TransferSyntax::Ndr64,
        bind_id: 0x0102,
    };
    let bytes = message.to_bytes();

    let mut expected = [0u8; BIND_MESSAGE_SIZE];
    // MessageType = bind.
    expected[0] = 0x01;
    // BindingStatus stays zero. Interface UUID, little-endian fields.
    expected[12..28].copy_from_slice(&[
        0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
        0xEE, 0xFF,
    ]);
    // Major 1, minor 2.
    expected[28] = 0x01;
    expected[30] = 0x02;
    // TransferSyntaxFlags = NDR64.
    expected[32] = 0x02;
    // Only the NDR64 bind-identifier slot is set.
    expected[38] = 0x02;
    expected[39] = 0x01;
    // SupportsMultipleSyntaxes = 1 for NDR64.
    expected[44] = 0x01;

    assert_eq!(bytes.to_vec(), expected.to_vec());
}

#[test]
fn test_dce_bind_frame_uses_the_dce_slot_alone() {
    let message = BindMessage {
        interface: fabricated_interface(),
        syntax: TransferSyntax::Dce,
        bind_id: 0xBEEF,
    };
    let bytes = message.to_bytes();

    assert_eq!(&bytes[32..36], &[0x01, 0x00, 0x00, 0x00]);
    assert_eq!(&bytes[36..38], &0xBEEFu16.to_le_bytes());
    assert_eq!(&bytes[38..40], &[0x00, 0x00]);
    assert_eq!(&bytes[40..42], &[0x00, 0x00]);
    // A lone DCE request does not advertise multiple syntaxes.
    assert_eq!(&bytes[44..48], &[0x00, 0x00, 0x00, 0x00]);
    // Causal flow and association fields stay zero.
    assert!(bytes[48..].iter().all(|&byte| byte == 0));
}

#[test]
fn test_bind_reply_parsing() {
    let mut reply = [0u8; BIND_MESSAGE_SIZE];
    reply[0] = MESSAGE_TYPE_BIND as u8;
    reply[8..12].copy_from_slice(&0xC0020042u32.to_le_bytes());

    assert_eq!(BindMessage::parse_reply(&reply), Ok(0xC0020042));
}

#[test]
fn test_short_or_mistyped_bind_replies_are_invalid() {
    assert_eq!(
        BindMessage::parse_reply(&[0u8; 16]),
        Err(AlpcRpcError::InvalidMessage)
    );

    let mut reply = [0u8; BIND_MESSAGE_SIZE];
    reply[0] = 0x03; // response, not bind
    assert_eq!(
        BindMessage::parse_reply(&reply),
        Err(AlpcRpcError::InvalidMessage)
    );
}

#[test]
fn test_request_frame_layout() {
    let uuid = Guid::from_u128(0x86d35949_83c9_4044_b424_db363231fd0c);
    let message = RequestMessage {
        flags: RequestFlags::UUID_SPECIFIED,
        call_id: 0xDEADC0DE,
        binding_id: 0x0007,
        procnum: 12,
        uuid,
    };
    let bytes = message.to_bytes();

    assert_eq!(bytes.len(), REQUEST_MESSAGE_SIZE);
    assert_eq!(&bytes[0..8], &[0u8; 8]); // MessageType = request
    assert_eq!(&bytes[8..12], &1u32.to_le_bytes()); // UUID specified
    assert_eq!(&bytes[12..16], &0xDEADC0DEu32.to_le_bytes());
    assert_eq!(&bytes[16..20], &7u32.to_le_bytes());
    assert_eq!(&bytes[20..24], &12u32.to_le_bytes());
    assert!(bytes[24..48].iter().all(|&byte| byte == 0));
    assert_eq!(&bytes[48..52], &uuid.data1.to_le_bytes());
}

#[test]
fn test_response_parsing() {
    let mut reply = [0u8; 24];
    reply[0] = 0x03; // MessageType = response
    reply[8..12].copy_from_slice(&4u32.to_le_bytes()); // view present
    reply[12..16].copy_from_slice(&0xDEADC0DEu32.to_le_bytes());

    let response = ResponseMessage::parse(&reply).expect("parse");
    assert!(response.flags.contains(ResponseFlags::VIEW_PRESENT));
    assert_eq!(response.call_id, 0xDEADC0DE);
}

#[test]
fn test_fault_frames_surface_the_rpc_status() {
    let mut reply = [0u8; 16];
    reply[0] = 0x02; // MessageType = fault
    reply[8..12].copy_from_slice(&0x000006D1u32.to_le_bytes()); // RPC_S_PROCNUM_OUT_OF_RANGE

    assert_eq!(
        ResponseMessage::parse(&reply),
        Err(AlpcRpcError::FaultReceived(0x06D1))
    );
}

#[test]
fn test_unknown_frames_are_invalid_messages() {
    let mut reply = [0u8; 24];
    reply[0] = 0x01; // a bind frame is not a call reply

    assert_eq!(
        ResponseMessage::parse(&reply),
        Err(AlpcRpcError::InvalidMessage)
    );
    assert_eq!(
        ResponseMessage::parse(&[0u8; 4]),
        Err(AlpcRpcError::InvalidMessage)
    );
}

#[test]
fn test_truncated_response_is_invalid() {
    let mut reply = [0u8; 16];
    reply[0] = 0x03;
    assert_eq!(
        ResponseMessage::parse(&reply),
        Err(AlpcRpcError::InvalidMessage)
    );
}
