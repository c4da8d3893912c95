//! Endpoint-mapper lookup: tower encoding and the `ept_map` side call.
//!
//! Ports whose names are not statically known are discovered by asking the
//! well-known mapper which local endpoints serve an interface. The request
//! describes the desired protocol stack as a four-floor tower; the reply
//! is a list of towers whose named-pipe floors carry candidate endpoint
//! names.

use log::debug;

use crate::error::{AlpcRpcError, Result};
use crate::ndr::{
    ConformantArray, ConformantVaryingPointerArray, ContextHandle, MarshallBuffer, NdrPrimitive,
    NdrType, NdrUniquePointer, PlainData, TransferSyntax,
};
use crate::port::MessagePort;
use crate::stream::RwStream;

use super::{EPMAPPER_INTERFACE, EPMAPPER_PORT_NAME, SyntaxId, bind_to_interface, call_method};

/// Protocol identifier prefix marking a UUID-derived floor.
const PROTOCOL_UUID_DERIVED: u8 = 0x0d;
/// The local-RPC protocol floor (rpcrt4's LrpcTowerExplode case).
const PROTOCOL_NCALRPC: u8 = 0x0c;
/// The named-pipe floor; its right-hand side carries the endpoint name.
const PROTOCOL_NAMED_PIPE: u8 = 0x10;

/// `ept_map` procedure ordinal on the mapper interface.
const EPT_MAP_PROCNUM: u16 = 3;

/// Prefix turning a mapper endpoint into a connectable port name.
pub const RPC_CONTROL_PREFIX: &str = "\\RPC Control\\";

/// A protocol tower as the mapper exchanges it: a count-prefixed sequence
/// of floors, serialised as a byte-counted conformant blob.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EpmTower {
    octets: Vec<u8>,
}

impl EpmTower {
    /// Builds the four-floor request tower for an interface under a
    /// transfer syntax: the interface floor, the syntax floor, the
    /// local-RPC floor and an empty named-pipe floor asking the mapper to
    /// fill in endpoints.
    pub fn for_interface(interface: &SyntaxId, transfer_syntax: &SyntaxId) -> Self {
        let mut octets = Vec::with_capacity(66);
        octets.extend_from_slice(&4u16.to_le_bytes());

        Self::push_uuid_floor(&mut octets, interface);
        Self::push_uuid_floor(&mut octets, transfer_syntax);

        // Local-RPC floor: protocol tag only, reserved right-hand side.
        octets.extend_from_slice(&1u16.to_le_bytes());
        octets.push(PROTOCOL_NCALRPC);
        octets.extend_from_slice(&2u16.to_le_bytes());
        octets.extend_from_slice(&0u16.to_le_bytes());

        // Named-pipe floor: empty endpoint request, two NUL bytes.
        octets.extend_from_slice(&1u16.to_le_bytes());
        octets.push(PROTOCOL_NAMED_PIPE);
        octets.extend_from_slice(&0u16.to_le_bytes());
        octets.extend_from_slice(&[0, 0]);

        Self { octets }
    }

    fn push_uuid_floor(octets: &mut Vec<u8>, identifier: &SyntaxId) {
        // Left-hand side: tag, UUID, major version (19 bytes).
        octets.extend_from_slice(&19u16.to_le_bytes());
        octets.push(PROTOCOL_UUID_DERIVED);
        octets.extend_from_slice(identifier.guid.to_le_bytes().as_ref());
        octets.extend_from_slice(&identifier.version.major.to_le_bytes());
        // Right-hand side: minor version.
        octets.extend_from_slice(&2u16.to_le_bytes());
        octets.extend_from_slice(&identifier.version.minor.to_le_bytes());
    }

    /// Wraps already-encoded tower octets, e.g. one captured from a
    /// mapper reply.
    pub fn from_octets(octets: Vec<u8>) -> Self {
        Self { octets }
    }

    /// The raw tower octets, floor count included.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }

    /// Walks the floors of a reply tower and extracts the named-pipe
    /// floor's endpoint string. Returns `None` for malformed towers or
    /// towers without that floor.
    pub fn endpoint(&self) -> Option<String> {
        let mut offset = 2usize;
        let floor_count = u16::from_le_bytes([*self.octets.first()?, *self.octets.get(1)?]);

        for _ in 0..floor_count {
            let lhs_count = self.read_u16(offset)?;
            let protocol = *self.octets.get(offset + 2)?;
            let rhs_offset = offset + 2 + usize::from(lhs_count);

            let rhs_count = self.read_u16(rhs_offset)?;
            let rhs_start = rhs_offset + 2;
            let rhs_end = rhs_start + usize::from(rhs_count);
            if rhs_end > self.octets.len() {
                return None;
            }

            if protocol == PROTOCOL_NAMED_PIPE {
                let name: Vec<u8> = self.octets[rhs_start..rhs_end]
                    .iter()
                    .copied()
                    .take_while(|&byte| byte != 0)
                    .collect();
                if name.is_empty() {
                    return None;
                }
                return String::from_utf8(name).ok();
            }

            offset = rhs_end;
        }
        None
    }

    fn read_u16(&self, offset: usize) -> Option<u16> {
        Some(u16::from_le_bytes([
            *self.octets.get(offset)?,
            *self.octets.get(offset + 1)?,
        ]))
    }
}

impl NdrType for EpmTower {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        let size =
            u32::try_from(self.octets.len()).map_err(|_| AlpcRpcError::IntegerOverflow)?;
        NdrPrimitive::from(size).marshall(stream, syntax)?;

        let bytes: Vec<NdrPrimitive<u8>> = self.octets.iter().copied().map(Into::into).collect();
        ConformantArray::new(bytes).marshall(stream, syntax)
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        let mut size = NdrPrimitive::<u32>::default();
        size.unmarshall(stream, syntax)?;

        let mut bytes = ConformantArray::<NdrPrimitive<u8>>::default();
        bytes.unmarshall(stream, syntax)?;
        self.octets = bytes.elements().iter().map(|byte| byte.value()).collect();
        Ok(())
    }
}

/// Asks the endpoint mapper which ports serve `interface` under `syntax`,
/// then connects and binds to the first endpoint that accepts. The mapper
/// conversation itself always runs under DCE, which every mapper speaks.
pub fn find_endpoint_and_connect<P: MessagePort>(
    interface: &SyntaxId,
    syntax: TransferSyntax,
) -> Result<(P, u16)> {
    let mapper = P::connect(EPMAPPER_PORT_NAME)?;
    let mapper_binding = bind_to_interface(&mapper, &EPMAPPER_INTERFACE, TransferSyntax::Dce)?;

    // ept_map(
    //     [in, ptr] UUID* obj,
    //     [in, ptr] twr_p_t map_tower,
    //     [in, out] ept_lookup_handle_t* entry_handle,
    //     [in] unsigned long max_towers,
    //     [out] unsigned long* num_towers,
    //     [out, ptr] twr_p_t* ITowers,
    //     [out] error_status* status);
    let object = NdrUniquePointer::new(NdrPrimitive::from(interface.guid));
    let map_tower = NdrUniquePointer::new(EpmTower::for_interface(interface, &syntax.identifier()));
    let mut entry_handle = NdrPrimitive::<ContextHandle>::default();
    let max_towers = NdrPrimitive::from(1u32);

    let mut input = MarshallBuffer::new(TransferSyntax::Dce);
    let mut output = MarshallBuffer::new(TransferSyntax::Dce);
    input
        .marshall(&object)
        .marshall(&map_tower)
        .marshall(&entry_handle)
        .marshall(&max_towers);
    input.status()?;

    call_method(
        &mapper,
        mapper_binding,
        EPMAPPER_INTERFACE.guid,
        EPT_MAP_PROCNUM,
        &input,
        &mut output,
    )?;

    let mut num_towers = NdrPrimitive::<u32>::default();
    let mut towers = ConformantVaryingPointerArray::<EpmTower>::default();
    let mut map_status = NdrPrimitive::<u32>::default();
    output
        .unmarshall(&mut entry_handle)
        .unmarshall(&mut num_towers)
        .unmarshall(&mut towers)
        .unmarshall(&mut map_status);
    output.status()?;

    if map_status.value() != 0 {
        debug!("ept_map returned status {:#x}", map_status.value());
        return Err(AlpcRpcError::ConnectionRefused);
    }

    // Attempt each returned endpoint; the first successful bind wins.
    for tower in towers.elements().iter().flatten() {
        let Some(endpoint) = tower.endpoint() else {
            continue;
        };
        let port_name = format!("{RPC_CONTROL_PREFIX}{endpoint}");

        let Ok(port) = P::connect(&port_name) else {
            debug!("endpoint {port_name} did not accept a connection");
            continue;
        };
        match bind_to_interface(&port, interface, syntax) {
            Ok(binding_id) => return Ok((port, binding_id)),
            Err(error) => debug!("endpoint {port_name} refused the bind: {error}"),
        }
    }

    Err(AlpcRpcError::ConnectionRefused)
}
