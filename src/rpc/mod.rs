//! The RPC protocol engine: interface identifiers, binding, calling and
//! endpoint discovery over any [`MessagePort`].

pub mod epmapper;
pub mod message;

use core::sync::atomic::{AtomicU16, Ordering};

use log::debug;

use crate::error::{AlpcRpcError, Result};
use crate::ndr::{Guid, MarshallBuffer, TransferSyntax};
use crate::port::MessagePort;

use message::{BindMessage, RequestFlags, RequestMessage, ResponseFlags, ResponseMessage};

/// Major/minor version pair of an interface or transfer syntax.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RpcVersion {
    pub major: u16,
    pub minor: u16,
}

/// A 128-bit interface identifier together with its version — what the
/// wire calls a syntax identifier, used both for interfaces and for
/// transfer syntaxes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxId {
    pub guid: Guid,
    pub version: RpcVersion,
}

impl SyntaxId {
    pub const fn new(guid: Guid, major: u16, minor: u16) -> Self {
        Self {
            guid,
            version: RpcVersion { major, minor },
        }
    }
}

/// The well-known endpoint-mapper port.
pub const EPMAPPER_PORT_NAME: &str = "\\RPC Control\\epmapper";

/// The endpoint-mapper interface, v3.0.
pub const EPMAPPER_INTERFACE: SyntaxId =
    SyntaxId::new(Guid::from_u128(0xe1af8308_5d1f_11c9_91a4_08002b14a0fa), 3, 0);

/// The classic DCE-NDR transfer syntax, v2.0.
pub const DCE_NDR_TRANSFER_SYNTAX: SyntaxId =
    SyntaxId::new(Guid::from_u128(0x8a885d04_1ceb_11c9_9fe8_08002b104860), 2, 0);

/// The NDR64 transfer syntax, v1.0.
pub const NDR64_TRANSFER_SYNTAX: SyntaxId =
    SyntaxId::new(Guid::from_u128(0x71710533_beba_4937_8319_b5dbef9ccc36), 1, 0);

impl TransferSyntax {
    /// The syntax identifier announced to the endpoint mapper for this
    /// dialect.
    pub fn identifier(self) -> SyntaxId {
        match self {
            TransferSyntax::Dce => DCE_NDR_TRANSFER_SYNTAX,
            TransferSyntax::Ndr64 => NDR64_TRANSFER_SYNTAX,
        }
    }
}

/// The fixed call identifier stamped into every request. The transport
/// matches replies to requests; this value only self-checks that the reply
/// belongs to a call this engine issued.
pub const CALL_ID_SENTINEL: u32 = 0xDEAD_C0DE;

/// Binding identifiers come from a process-wide monotonically increasing
/// counter. Distinctness across a 16-bit wrap is unspecified; the value
/// only routes replies within a single bind transaction.
static NEXT_BINDING_ID: AtomicU16 = AtomicU16::new(0);

fn allocate_binding_id() -> u16 {
    NEXT_BINDING_ID
        .fetch_add(1, Ordering::Relaxed)
        .wrapping_add(1)
}

/// Binds `port` to an interface under the chosen transfer syntax,
/// returning the allocated binding identifier.
pub fn bind_to_interface<P: MessagePort>(
    port: &P,
    interface: &SyntaxId,
    syntax: TransferSyntax,
) -> Result<u16> {
    let bind_id = allocate_binding_id();
    let request = BindMessage {
        interface: *interface,
        syntax,
        bind_id,
    };

    let reply = port.send_receive(&request.to_bytes())?;
    let binding_status = BindMessage::parse_reply(&reply.data)?;
    if binding_status != 0 {
        debug!(
            "bind to {} rejected with binding status {binding_status:#x}",
            interface.guid
        );
        return Err(AlpcRpcError::ConnectionRefused);
    }

    debug!("bound to {} with binding id {bind_id}", interface.guid);
    Ok(bind_id)
}

/// Invokes procedure `procnum` on a bound port: frames the marshalled
/// in-arguments behind a request body, performs one exchange, checks the
/// reply and hands the out-argument stream to `output`.
pub fn call_method<P: MessagePort>(
    port: &P,
    bind_id: u16,
    interface_uuid: Guid,
    procnum: u16,
    input: &MarshallBuffer,
    output: &mut MarshallBuffer,
) -> Result<()> {
    input.status()?;

    let request = RequestMessage {
        flags: RequestFlags::UUID_SPECIFIED,
        call_id: CALL_ID_SENTINEL,
        binding_id: u32::from(bind_id),
        procnum: u32::from(procnum),
        uuid: interface_uuid,
    };

    let mut frame = request.to_bytes().to_vec();
    frame.extend_from_slice(input.bytes());

    let reply = port.send_receive(&frame)?;
    let response = ResponseMessage::parse(&reply.data)?;
    if response.call_id != CALL_ID_SENTINEL {
        return Err(AlpcRpcError::InvalidMessage);
    }

    // The out-arguments are either inline after the response body or in
    // the out-of-band view payload.
    let out_arguments: &[u8] = if response.flags.contains(ResponseFlags::VIEW_PRESENT) {
        reply.view.as_deref().unwrap_or_default()
    } else {
        &reply.data[message::RESPONSE_MESSAGE_SIZE..]
    };

    output.marshall_raw(out_arguments);
    output.status()
}

/// A port connected and bound to one interface, ready for calls.
pub struct RpcClientPort<P: MessagePort> {
    port: P,
    interface: SyntaxId,
    syntax: TransferSyntax,
    binding_id: u16,
}

impl<P: MessagePort> RpcClientPort<P> {
    /// Connects via endpoint-mapper discovery, preferring the denser NDR64
    /// encoding and falling back to DCE when the server refuses it.
    pub fn connect(interface: &SyntaxId) -> Result<Self> {
        Self::connect_with_syntax(interface, TransferSyntax::Ndr64)
            .or_else(|_| Self::connect_with_syntax(interface, TransferSyntax::Dce))
    }

    /// Connects via endpoint-mapper discovery under one specific syntax.
    pub fn connect_with_syntax(interface: &SyntaxId, syntax: TransferSyntax) -> Result<Self> {
        let (port, binding_id) = epmapper::find_endpoint_and_connect::<P>(interface, syntax)?;
        Ok(Self {
            port,
            interface: *interface,
            syntax,
            binding_id,
        })
    }

    /// Connects to a statically known port name, preferring NDR64 and
    /// falling back to DCE.
    pub fn connect_to_port(port_name: &str, interface: &SyntaxId) -> Result<Self> {
        Self::connect_to_port_with_syntax(port_name, interface, TransferSyntax::Ndr64)
            .or_else(|_| Self::connect_to_port_with_syntax(port_name, interface, TransferSyntax::Dce))
    }

    /// Connects to a statically known port name under one specific syntax.
    pub fn connect_to_port_with_syntax(
        port_name: &str,
        interface: &SyntaxId,
        syntax: TransferSyntax,
    ) -> Result<Self> {
        let port = P::connect(port_name)?;
        let binding_id = bind_to_interface(&port, interface, syntax)?;
        Ok(Self {
            port,
            interface: *interface,
            syntax,
            binding_id,
        })
    }

    /// Calls a procedure by ordinal with marshalled in-arguments,
    /// receiving the marshalled out-arguments into `output`.
    pub fn call_procedure(
        &self,
        procnum: u16,
        input: &MarshallBuffer,
        output: &mut MarshallBuffer,
    ) -> Result<()> {
        call_method(
            &self.port,
            self.binding_id,
            self.interface.guid,
            procnum,
            input,
            output,
        )
    }

    /// The transfer syntax this binding negotiated.
    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.syntax
    }

    /// The bound interface.
    pub fn interface(&self) -> &SyntaxId {
        &self.interface
    }

    /// The binding identifier allocated for this (port, interface, syntax)
    /// triple.
    pub fn binding_id(&self) -> u16 {
        self.binding_id
    }
}
