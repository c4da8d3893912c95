//! Client for the event log service (MS-EVEN6).

use crate::error::Result;
use crate::ndr::{
    ConformantPointerArray, ContextHandle, Guid, MarshallBuffer, NdrPrimitive, NdrUniquePointer,
    NdrWstring, RpcInfo, TransferSyntax, unique_wstring,
};
use crate::port::MessagePort;
use crate::rpc::{RpcClientPort, SyntaxId};

/// IEventService, v1.0.
pub const EVENT_SERVICE_INTERFACE: SyntaxId = SyntaxId::new(
    Guid::from_u128(0xf6beaff7_1e19_4fbb_9f8f_b89e2018337c),
    1,
    0,
);

/// Minimal event log client. The port is discovered through the endpoint
/// mapper.
pub struct EventLogClient<P: MessagePort> {
    port: RpcClientPort<P>,
}

impl<P: MessagePort> EventLogClient<P> {
    /// Connects and binds, NDR64 first with DCE fallback.
    pub fn create() -> Result<Self> {
        Ok(Self {
            port: RpcClientPort::connect(&EVENT_SERVICE_INTERFACE)?,
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

    /// `EvtRpcRegisterControllableOperation` (opnum 4): obtains a control
    /// handle for cancellable operations. Returns the handle and the
    /// server status.
    pub fn register_controllable_operation(&self) -> Result<(ContextHandle, u32)> {
        let (input, mut output) = self.buffers();

        self.port.call_procedure(4, &input, &mut output)?;

        let mut handle = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut handle).unmarshall(&mut status);
        output.status()?;

        Ok((handle.value(), status.value()))
    }

    /// `EvtRpcClearLog` (opnum 6): clears one channel, optionally backing
    /// it up first. Returns the server's RpcInfo record and status.
    pub fn clear_log(
        &self,
        control: ContextHandle,
        channel_path: &str,
        backup_path: Option<&str>,
        flags: u32,
    ) -> Result<(RpcInfo, u32)> {
        // error_status_t EvtRpcClearLog(
        //     [in, context_handle] PCONTEXT_HANDLE_OPERATION_CONTROL control,
        //     [in, string] LPCWSTR channelPath,
        //     [in, unique, string] LPCWSTR backupPath,
        //     [in] DWORD flags,
        //     [out] RpcInfo* error);
        let control = NdrPrimitive::from(control);
        let channel_path = NdrWstring::from_str(channel_path, true);
        let backup_path = unique_wstring(backup_path, true);
        let flags = NdrPrimitive::from(flags);

        let (mut input, mut output) = self.buffers();
        input
            .marshall(&control)
            .marshall(&channel_path)
            .marshall(&backup_path)
            .marshall(&flags);

        self.port.call_procedure(6, &input, &mut output)?;

        let mut info = RpcInfo::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut info).unmarshall(&mut status);
        output.status()?;

        Ok((info, status.value()))
    }

    /// `EvtRpcClose` (opnum 13): releases a handle obtained from this
    /// interface. The handle is updated in place with the server's
    /// (zeroed) value.
    pub fn close(&self, handle: &mut ContextHandle) -> Result<u32> {
        let (mut input, mut output) = self.buffers();
        input.marshall(&NdrPrimitive::from(*handle));

        self.port.call_procedure(13, &input, &mut output)?;

        let mut updated = NdrPrimitive::<ContextHandle>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut updated).unmarshall(&mut status);
        output.status()?;

        *handle = updated.value();
        Ok(status.value())
    }

    /// `EvtRpcGetChannelList` (opnum 19): enumerates every channel name.
    pub fn get_channel_list(&self) -> Result<(Vec<String>, u32)> {
        // error_status_t EvtRpcGetChannelList(
        //     [in] DWORD flags,
        //     [out] DWORD* numChannelPaths,
        //     [out, size_is(,*numChannelPaths), string] LPWSTR** channelPaths);
        let flags = NdrPrimitive::from(0u32);

        let (mut input, mut output) = self.buffers();
        input.marshall(&flags);

        self.port.call_procedure(19, &input, &mut output)?;

        let mut channel_count = NdrPrimitive::<u32>::default();
        let mut channel_paths =
            NdrUniquePointer::<ConformantPointerArray<NdrWstring>>::default();
        let mut status = NdrPrimitive::<u32>::default();
        output
            .unmarshall(&mut channel_count)
            .unmarshall(&mut channel_paths)
            .unmarshall(&mut status);
        output.status()?;

        let channels = channel_paths
            .as_ref()
            .map(|paths| {
                paths
                    .elements()
                    .iter()
                    .flatten()
                    .map(NdrWstring::to_string_lossy)
                    .collect()
            })
            .unwrap_or_default();

        Ok((channels, status.value()))
    }
}
