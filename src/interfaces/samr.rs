//! Client for the security account manager (MS-SAMR).

use crate::error::Result;
use crate::ndr::{
    ContextHandle, Guid, MarshallBuffer, NdrPrimitive, NdrUniquePointer, RpcSid,
    RpcUnicodeString, TransferSyntax, unique_wstring,
};
use crate::port::MessagePort;
use crate::rpc::{RpcClientPort, SyntaxId};

/// samr, v1.0.
pub const SAMR_INTERFACE: SyntaxId = SyntaxId::new(
    Guid::from_u128(0x12345778_1234_abcd_ef00_0123456789ac),
    1,
    0,
);

/// A normal user account, for `SamrCreateUser2InDomain`.
pub const USER_NORMAL_ACCOUNT: u32 = 0x0000_0010;

/// Minimal SAM client. The port is discovered through the endpoint mapper.
pub struct SamClient<P: MessagePort> {
    port: RpcClientPort<P>,
}

impl<P: MessagePort> SamClient<P> {
    /// Connects and binds, NDR64 first with DCE fallback.
    pub fn create() -> Result<Self> {
        Ok(Self {
            port: RpcClientPort::connect(&SAMR_INTERFACE)?,
        })
    }

    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.port.transfer_syntax()
    }

    fn buffers(&self) -> (MarshallBuffer, MarshallBuffer) {
        (
            MarshallBuffer::new(self.port.transfer_syntax()),
            MarshallBuffer::new(self.port.transfer_syntax()),
        )
    }

    /// `SamrConnect` (opnum 0): opens the SAM server database. Returns the
    /// server handle and the server status.
    pub fn connect_server(
        &self,
        server_name: Option<&str>,
        desired_access: u32,
    ) -> Result<(ContextHandle, u32)> {
        // long SamrConnect(
        //     [in, unique] PSAMPR_SERVER_NAME ServerName,
        //     [out] SAMPR_HANDLE* ServerHandle,
        //     [in] unsigned long DesiredAccess);
        let server_name = unique_wstring(server_name, false);
        let desired_access = NdrPrimitive::from(desired_access);

        let (mut input, mut output) = self.buffers();
        input.marshall(&server_name).marshall(&desired_access);

        self.port.call_procedure(0, &input, &mut output)?;

        let mut server = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut server).unmarshall(&mut status);
        output.status()?;

        Ok((server.value(), status.value()))
    }

    /// `SamrCloseHandle` (opnum 1): closes any SAM handle, updating it in
    /// place with the server's value.
    pub fn close_handle(&self, handle: &mut ContextHandle) -> Result<u32> {
        let (mut input, mut output) = self.buffers();
        input.marshall(&NdrPrimitive::from(*handle));

        self.port.call_procedure(1, &input, &mut output)?;

        let mut updated = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut updated).unmarshall(&mut status);
        output.status()?;

        *handle = updated.value();
        Ok(status.value())
    }

    /// `SamrLookupDomainInSamServer` (opnum 5): resolves a domain name to
    /// its SID.
    pub fn lookup_domain(
        &self,
        server: ContextHandle,
        domain_name: &str,
    ) -> Result<(Option<RpcSid>, u32)> {
        // long SamrLookupDomainInSamServer(
        //     [in] SAMPR_HANDLE ServerHandle,
        //     [in] PRPC_UNICODE_STRING Name,
        //     [out] PRPC_SID* DomainId);
        let server = NdrPrimitive::from(server);
        let name = RpcUnicodeString::from_str(domain_name);

        let (mut input, mut output) = self.buffers();
        input.marshall(&server).marshall(&name);

        self.port.call_procedure(5, &input, &mut output)?;

        let mut domain_sid = NdrUniquePointer::<RpcSid>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut domain_sid).unmarshall(&mut status);
        output.status()?;

        Ok((domain_sid.into_inner(), status.value()))
    }

    /// `SamrOpenDomain` (opnum 7): opens the domain identified by a SID.
    pub fn open_domain(
        &self,
        server: ContextHandle,
        desired_access: u32,
        domain_sid: &RpcSid,
    ) -> Result<(ContextHandle, u32)> {
        let server = NdrPrimitive::from(server);
        let desired_access = NdrPrimitive::from(desired_access);

        let (mut input, mut output) = self.buffers();
        input
            .marshall(&server)
            .marshall(&desired_access)
            .marshall(domain_sid);

        self.port.call_procedure(7, &input, &mut output)?;

        let mut domain = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut domain).unmarshall(&mut status);
        output.status()?;

        Ok((domain.value(), status.value()))
    }

    /// `SamrCreateUser2InDomain` (opnum 50): creates a user account.
    /// Returns the user handle, the granted access mask, the new RID and
    /// the server status.
    pub fn create_user_in_domain(
        &self,
        domain: ContextHandle,
        user_name: &str,
        account_type: u32,
        desired_access: u32,
    ) -> Result<(ContextHandle, u32, u32, u32)> {
        // long SamrCreateUser2InDomain(
        //     [in] SAMPR_HANDLE DomainHandle,
        //     [in] PRPC_UNICODE_STRING Name,
        //     [in] unsigned long AccountType,
        //     [in] unsigned long DesiredAccess,
        //     [out] SAMPR_HANDLE* UserHandle,
        //     [out] unsigned long* GrantedAccess,
        //     [out] unsigned long* RelativeId);
        let domain = NdrPrimitive::from(domain);
        let name = RpcUnicodeString::from_str(user_name);
        let account_type = NdrPrimitive::from(account_type);
        let desired_access = NdrPrimitive::from(desired_access);

        let (mut input, mut output) = self.buffers();
        input
            .marshall(&domain)
            .marshall(&name)
            .marshall(&account_type)
            .marshall(&desired_access);

        self.port.call_procedure(50, &input, &mut output)?;

        let mut user = NdrPrimitive::<ContextHandle>::default();
        let mut granted_access = NdrPrimitive::<u32>::default();
        let mut relative_id = NdrPrimitive::<u32>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output
            .unmarshall(&mut user)
            .unmarshall(&mut granted_access)
            .unmarshall(&mut relative_id)
            .unmarshall(&mut status);
        output.status()?;

        Ok((
            user.value(),
            granted_access.value(),
            relative_id.value(),
            status.value(),
        ))
    }
}
