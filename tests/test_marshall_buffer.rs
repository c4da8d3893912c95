use alpc_rpc::AlpcRpcError;
use alpc_rpc::ndr::{
    ConformantArray, MarshallBuffer, NdrPrimitive, NdrSizeT, TransferSyntax,
};
use pretty_assertions::assert_eq;

#[test]
fn test_chained_operations_accumulate() {
    let mut buffer = MarshallBuffer::new(TransferSyntax::Dce);
    buffer
        .marshall(&NdrPrimitive::from(0x01u8))
        .marshall(&NdrPrimitive::from(0x0302u16));

    buffer.status().expect("chain");
    assert_eq!(buffer.bytes(), &[0x01, 0x00, 0x02, 0x03]);
}

#[test]
fn test_first_failure_is_latched_and_contents_freeze() {
    let mut buffer = MarshallBuffer::new(TransferSyntax::Dce);
    buffer.marshall(&NdrPrimitive::from(0xAAu8));
    let snapshot = buffer.bytes().to_vec();

    // A size above the 32-bit boundary cannot marshall under DCE.
    buffer.marshall(&NdrSizeT::from(1u64 << 32));
    assert_eq!(buffer.status(), Err(AlpcRpcError::IntegerOverflow));

    // Later operations are no-ops: the content and status never change.
    buffer.marshall(&NdrPrimitive::from(0xBBu8));
    let mut out = NdrPrimitive::<u8>::default();
    buffer.unmarshall(&mut out);

    assert_eq!(buffer.status(), Err(AlpcRpcError::IntegerOverflow));
    assert_eq!(buffer.bytes(), snapshot.as_slice());
}

#[test]
fn test_failed_unmarshall_latches_too() {
    let mut buffer = MarshallBuffer::new(TransferSyntax::Dce);

    let mut out = NdrPrimitive::<u32>::default();
    buffer.unmarshall(&mut out);
    assert_eq!(buffer.status(), Err(AlpcRpcError::BufferUnderflow));

    // The buffer keeps reporting the first failure, not later ones.
    let empty = ConformantArray::<NdrPrimitive<u8>>::default();
    buffer.marshall(&empty);
    assert_eq!(buffer.status(), Err(AlpcRpcError::BufferUnderflow));
}

#[test]
fn test_unknown_transfer_syntax_flag_poisons_the_buffer() {
    let mut buffer = MarshallBuffer::with_flags(4);
    assert_eq!(buffer.status(), Err(AlpcRpcError::UnknownTransferSyntax(4)));

    buffer.marshall(&NdrPrimitive::from(1u32));
    assert_eq!(buffer.status(), Err(AlpcRpcError::UnknownTransferSyntax(4)));
    assert!(buffer.bytes().is_empty());
}

#[test]
fn test_recognised_flags_map_to_syntaxes() {
    assert_eq!(MarshallBuffer::with_flags(1).syntax(), TransferSyntax::Dce);
    assert_eq!(MarshallBuffer::with_flags(2).syntax(), TransferSyntax::Ndr64);
}

#[test]
fn test_raw_bytes_are_appended_unaligned() {
    let mut buffer = MarshallBuffer::new(TransferSyntax::Ndr64);
    buffer.marshall(&NdrPrimitive::from(0x11u8));
    buffer.marshall_raw(&[0x22, 0x33]);

    buffer.status().expect("chain");
    assert_eq!(buffer.bytes(), &[0x11, 0x22, 0x33]);
}
