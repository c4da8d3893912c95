//! Client for the service control manager (MS-SCMR).

use crate::error::Result;
use crate::ndr::{
    ConformantArray, ContextHandle, Guid, MarshallBuffer, NdrPrimitive, NdrUniquePointer,
    NdrWstring, TransferSyntax, unique_wstring,
};
use crate::port::MessagePort;
use crate::rpc::{RpcClientPort, SyntaxId};

/// svcctl, v2.0.
pub const SVCCTL_INTERFACE: SyntaxId = SyntaxId::new(
    Guid::from_u128(0x367abb81_9844_35f1_ad32_98f038001003),
    2,
    0,
);

/// The service control manager listens on a well-known port; no mapper
/// lookup is needed.
pub const NTSVCS_PORT_NAME: &str = "\\RPC Control\\ntsvcs";

/// Parameters for creating a service record, mirroring `RCreateServiceW`.
#[derive(Debug, Default, Clone)]
pub struct ServiceDescription<'a> {
    pub service_name: &'a str,
    pub display_name: Option<&'a str>,
    pub desired_access: u32,
    pub service_type: u32,
    pub start_type: u32,
    pub error_control: u32,
    pub binary_path: &'a str,
    pub load_order_group: Option<&'a str>,
    pub dependencies: Option<&'a [u8]>,
    pub start_name: Option<&'a str>,
    pub password: Option<&'a [u8]>,
}

/// Minimal service control client over the well-known ntsvcs port.
pub struct ServiceControlClient<P: MessagePort> {
    port: RpcClientPort<P>,
}

impl<P: MessagePort> ServiceControlClient<P> {
    /// Connects and binds, NDR64 first with DCE fallback.
    pub fn create() -> Result<Self> {
        Ok(Self {
            port: RpcClientPort::connect_to_port(NTSVCS_PORT_NAME, &SVCCTL_INTERFACE)?,
        })
    }

    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.port.transfer_syntax()
    }

    /// `ROpenSCManagerW` (opnum 15): opens the SCM database. Returns the
    /// database handle and the server status.
    pub fn open_sc_manager(
        &self,
        machine_name: Option<&str>,
        database_name: Option<&str>,
        desired_access: u32,
    ) -> Result<(ContextHandle, u32)> {
        // DWORD ROpenSCManagerW(
        //     [in, string, unique] SVCCTL_HANDLEW lpMachineName,
        //     [in, string, unique] wchar_t* lpDatabaseName,
        //     [in] DWORD dwDesiredAccess,
        //     [out] LPSC_RPC_HANDLE lpScHandle);
        let machine_name = unique_wstring(machine_name, true);
        let database_name = unique_wstring(database_name, true);
        let desired_access = NdrPrimitive::from(desired_access);

        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input
            .marshall(&machine_name)
            .marshall(&database_name)
            .marshall(&desired_access);

        self.port.call_procedure(15, &input, &mut output)?;

        let mut manager = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut manager).unmarshall(&mut status);
        output.status()?;

        Ok((manager.value(), status.value()))
    }

    /// `RCloseServiceHandle` (opnum 0): closes any SCM handle, updating it
    /// in place with the server's value.
    pub fn close_service_handle(&self, handle: &mut ContextHandle) -> Result<u32> {
        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input.marshall(&NdrPrimitive::from(*handle));

        self.port.call_procedure(0, &input, &mut output)?;

        let mut updated = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut updated).unmarshall(&mut status);
        output.status()?;

        *handle = updated.value();
        Ok(status.value())
    }

    /// `RCreateServiceW` (opnum 12): installs a service record. Returns
    /// the tag value, the new service handle and the server status.
    pub fn create_service(
        &self,
        sc_manager: ContextHandle,
        description: &ServiceDescription<'_>,
    ) -> Result<(Option<u32>, ContextHandle, u32)> {
        // DWORD RCreateServiceW(
        //     [in] SC_RPC_HANDLE hSCManager,
        //     [in, string] wchar_t* lpServiceName,
        //     [in, string, unique] wchar_t* lpDisplayName,
        //     [in] DWORD dwDesiredAccess,
        //     [in] DWORD dwServiceType,
        //     [in] DWORD dwStartType,
        //     [in] DWORD dwErrorControl,
        //     [in, string] wchar_t* lpBinaryPathName,
        //     [in, string, unique] wchar_t* lpLoadOrderGroup,
        //     [in, out, unique] LPDWORD lpdwTagId,
        //     [in, unique, size_is(dwDependSize)] LPBYTE lpDependencies,
        //     [in] DWORD dwDependSize,
        //     [in, string, unique] wchar_t* lpServiceStartName,
        //     [in, unique, size_is(dwPwSize)] LPBYTE lpPassword,
        //     [in] DWORD dwPwSize,
        //     [out] LPSC_RPC_HANDLE lpServiceHandle);
        let sc_manager = NdrPrimitive::from(sc_manager);
        let service_name = NdrWstring::from_str(description.service_name, true);
        let display_name = unique_wstring(description.display_name, true);
        let desired_access = NdrPrimitive::from(description.desired_access);
        let service_type = NdrPrimitive::from(description.service_type);
        let start_type = NdrPrimitive::from(description.start_type);
        let error_control = NdrPrimitive::from(description.error_control);
        let binary_path = NdrWstring::from_str(description.binary_path, true);
        let load_order_group = unique_wstring(description.load_order_group, true);
        let mut tag_id = NdrUniquePointer::<NdrPrimitive<u32>>::null();
        let dependencies = byte_blob(description.dependencies);
        let depend_size =
            NdrPrimitive::from(description.dependencies.map_or(0, |bytes| bytes.len() as u32));
        let start_name = unique_wstring(description.start_name, true);
        let password = byte_blob(description.password);
        let password_size =
            NdrPrimitive::from(description.password.map_or(0, |bytes| bytes.len() as u32));

        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input
            .marshall(&sc_manager)
            .marshall(&service_name)
            .marshall(&display_name)
            .marshall(&desired_access)
            .marshall(&service_type)
            .marshall(&start_type)
            .marshall(&error_control)
            .marshall(&binary_path)
            .marshall(&load_order_group)
            .marshall(&tag_id)
            .marshall(&dependencies)
            .marshall(&depend_size)
            .marshall(&start_name)
            .marshall(&password)
            .marshall(&password_size);

        self.port.call_procedure(12, &input, &mut output)?;

        let mut service = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output
            .unmarshall(&mut tag_id)
            .unmarshall(&mut service)
            .unmarshall(&mut status);
        output.status()?;

        let tag = tag_id.as_ref().map(NdrPrimitive::value);
        Ok((tag, service.value(), status.value()))
    }
}

fn byte_blob(bytes: Option<&[u8]>) -> NdrUniquePointer<ConformantArray<NdrPrimitive<u8>>> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => NdrUniquePointer::new(ConformantArray::new(
            bytes.iter().copied().map(Into::into).collect(),
        )),
        _ => NdrUniquePointer::null(),
    }
}
