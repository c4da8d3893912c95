use alpc_rpc::ndr::{ConformantArray, NdrPrimitive, NdrType, TransferSyntax};
use alpc_rpc::rpc::epmapper::EpmTower;
use alpc_rpc::rpc::{DCE_NDR_TRANSFER_SYNTAX, EPMAPPER_INTERFACE, NDR64_TRANSFER_SYNTAX};
use alpc_rpc::stream::RwStream;
use pretty_assertions::assert_eq;

#[test]
fn test_request_tower_layout() {
    let tower = EpmTower::for_interface(&EPMAPPER_INTERFACE, &DCE_NDR_TRANSFER_SYNTAX);
    let octets = tower.octets();

    // Floor count, two 25-byte UUID floors, 7-byte local-RPC floor and
    // 7-byte named-pipe floor.
    assert_eq!(octets.len(), 66);
    assert_eq!(&octets[0..2], &[0x04, 0x00]);

    // Floor 1: the requested interface.
    assert_eq!(&octets[2..4], &[0x13, 0x00]); // lhs byte count
    assert_eq!(octets[4], 0x0D); // UUID-derived protocol tag
    assert_eq!(&octets[5..9], &[0x08, 0x83, 0xAF, 0xE1]); // guid data1, little-endian
    assert_eq!(&octets[21..23], &[0x03, 0x00]); // major version
    assert_eq!(&octets[23..25], &[0x02, 0x00]); // rhs byte count
    assert_eq!(&octets[25..27], &[0x00, 0x00]); // minor version

    // Floor 2: the transfer syntax.
    assert_eq!(octets[29], 0x0D);
    assert_eq!(&octets[30..34], &[0x04, 0x5D, 0x88, 0x8A]);

    // Floor 3: local RPC.
    assert_eq!(&octets[52..59], &[0x01, 0x00, 0x0C, 0x02, 0x00, 0x00, 0x00]);
    // Floor 4: empty endpoint request, two NUL bytes.
    assert_eq!(&octets[59..66], &[0x01, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn test_request_tower_carries_the_requested_syntax() {
    let tower = EpmTower::for_interface(&EPMAPPER_INTERFACE, &NDR64_TRANSFER_SYNTAX);
    // NDR64 syntax GUID data1 at the second floor.
    assert_eq!(&tower.octets()[30..34], &[0x33, 0x05, 0x71, 0x71]);
}

#[test]
fn test_request_tower_has_no_endpoint() {
    let tower = EpmTower::for_interface(&EPMAPPER_INTERFACE, &DCE_NDR_TRANSFER_SYNTAX);
    assert_eq!(tower.endpoint(), None);
}

/// A reply-shaped tower whose named-pipe floor carries `endpoint`.
fn reply_tower(endpoint: &[u8]) -> EpmTower {
    let request = EpmTower::for_interface(&EPMAPPER_INTERFACE, &DCE_NDR_TRANSFER_SYNTAX);
    // Keep everything up to the named-pipe floor's rhs byte count.
    let mut octets = request.octets()[..62].to_vec();
    octets.extend_from_slice(&(endpoint.len() as u16).to_le_bytes());
    octets.extend_from_slice(endpoint);
    EpmTower::from_octets(octets)
}

#[test]
fn test_endpoint_extraction_from_a_reply_tower() {
    let tower = reply_tower(b"LRPC-deadbeef\0");
    assert_eq!(tower.endpoint().as_deref(), Some("LRPC-deadbeef"));
}

#[test]
fn test_malformed_towers_yield_no_endpoint() {
    assert_eq!(EpmTower::from_octets(vec![]).endpoint(), None);
    assert_eq!(EpmTower::from_octets(vec![0x01]).endpoint(), None);
    // A floor count pointing past the data.
    assert_eq!(EpmTower::from_octets(vec![0x04, 0x00, 0x13]).endpoint(), None);
}

#[test]
fn test_tower_serialisation_is_a_counted_conformant_blob() {
    let tower = EpmTower::for_interface(&EPMAPPER_INTERFACE, &DCE_NDR_TRANSFER_SYNTAX);

    let mut stream = RwStream::new();
    tower
        .marshall(&mut stream, TransferSyntax::Dce)
        .expect("marshall");

    // u32 byte count, conformant max-count, then the octets.
    let bytes = stream.buffer();
    assert_eq!(&bytes[0..4], &66u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &66u32.to_le_bytes());
    assert_eq!(&bytes[8..], tower.octets());

    let mut read_back = EpmTower::default();
    read_back
        .unmarshall(&mut stream, TransferSyntax::Dce)
        .expect("unmarshall");
    assert_eq!(read_back, tower);
}

#[test]
fn test_tower_round_trip_through_ndr_types() {
    // A tower is wire-equivalent to a size plus a conformant byte array.
    let tower = EpmTower::for_interface(&EPMAPPER_INTERFACE, &DCE_NDR_TRANSFER_SYNTAX);

    let mut stream = RwStream::new();
    NdrPrimitive::from(tower.octets().len() as u32)
        .marshall(&mut stream, TransferSyntax::Dce)
        .expect("size");
    ConformantArray::new(
        tower
            .octets()
            .iter()
            .copied()
            .map(NdrPrimitive::from)
            .collect(),
    )
    .marshall(&mut stream, TransferSyntax::Dce)
    .expect("blob");

    let mut read_back = EpmTower::default();
    read_back
        .unmarshall(&mut stream, TransferSyntax::Dce)
        .expect("unmarshall");
    assert_eq!(read_back, tower);
}
