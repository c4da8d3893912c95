//! Client for the firewall and advanced security service (MS-FASP).

use crate::error::Result;
use crate::ndr::{
    ContextHandle, Guid, MarshallBuffer, NdrEnumeration, NdrPrimitive, TransferSyntax,
};
use crate::port::MessagePort;
use crate::rpc::{RpcClientPort, SyntaxId};

/// RemoteFW, v1.0.
pub const FIREWALL_INTERFACE: SyntaxId = SyntaxId::new(
    Guid::from_u128(0x2fb92682_6599_42dc_ae13_bd2ca89bd11c),
    1,
    0,
);

/// The local policy store.
pub const STORE_TYPE_LOCAL: u16 = 0x2;
/// Read access to a policy store.
pub const POLICY_ACCESS_RIGHT_READ: u16 = 0x1;
/// Read/write access to a policy store.
pub const POLICY_ACCESS_RIGHT_READ_WRITE: u16 = 0x2;

/// Minimal firewall client. The port is discovered through the endpoint
/// mapper.
pub struct FirewallClient<P: MessagePort> {
    port: RpcClientPort<P>,
}

impl<P: MessagePort> FirewallClient<P> {
    /// Connects and binds, NDR64 first with DCE fallback.
    pub fn create() -> Result<Self> {
        Ok(Self {
            port: RpcClientPort::connect(&FIREWALL_INTERFACE)?,
        })
    }

    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.port.transfer_syntax()
    }

    /// `FWOpenPolicyStore` (opnum 0): opens a policy store. Returns the
    /// store handle and the server status.
    pub fn open_policy_store(
        &self,
        binary_version: u16,
        store_type: u16,
        access_right: u16,
        flags: u32,
    ) -> Result<(ContextHandle, u32)> {
        // unsigned long RRPC_FWOpenPolicyStore(
        //     [in] FW_CONN_HANDLE rpcConnHandle,
        //     [in] unsigned short BinaryVersion,
        //     [in] FW_STORE_TYPE StoreType,
        //     [in] FW_POLICY_ACCESS_RIGHT AccessRight,
        //     [in] unsigned long dwFlags,
        //     [out] PFW_POLICY_STORE_HANDLE phPolicyStore);
        let binary_version = NdrPrimitive::from(binary_version);
        let store_type = NdrEnumeration::from(store_type);
        let access_right = NdrEnumeration::from(access_right);
        let flags = NdrPrimitive::from(flags);

        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input
            .marshall(&binary_version)
            .marshall(&store_type)
            .marshall(&access_right)
            .marshall(&flags);

        self.port.call_procedure(0, &input, &mut output)?;

        let mut store = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut store).unmarshall(&mut status);
        output.status()?;

        Ok((store.value(), status.value()))
    }

    /// `FWClosePolicyStore` (opnum 1): closes a store handle, updating it
    /// in place with the server's value.
    pub fn close_policy_store(&self, store: &mut ContextHandle) -> Result<u32> {
        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input.marshall(&NdrPrimitive::from(*store));

        self.port.call_procedure(1, &input, &mut output)?;

        let mut updated = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut updated).unmarshall(&mut status);
        output.status()?;

        *store = updated.value();
        Ok(status.value())
    }

    /// `FWDeleteAllFirewallRules` (opnum 8): removes every firewall rule
    /// in the store.
    pub fn delete_all_firewall_rules(&self, store: ContextHandle) -> Result<u32> {
        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input.marshall(&NdrPrimitive::from(store));

        self.port.call_procedure(8, &input, &mut output)?;

        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut status);
        output.status()?;

        Ok(status.value())
    }
}
