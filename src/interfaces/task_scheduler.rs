//! Client for the task scheduler service (MS-TSCH).

use crate::error::Result;
use crate::ndr::{
    ConformantArray, Guid, MarshallBuffer, NdrPrimitive, NdrUniquePointer, NdrWstring,
    TransferSyntax, unique_wstring,
};
use crate::port::MessagePort;
use crate::rpc::{RpcClientPort, SyntaxId};

/// ITaskSchedulerService, v1.0.
pub const TASK_SCHEDULER_INTERFACE: SyntaxId = SyntaxId::new(
    Guid::from_u128(0x86d35949_83c9_4044_b424_db363231fd0c),
    1,
    0,
);

/// Minimal task scheduler client. The port is discovered through the
/// endpoint mapper.
pub struct TaskSchedulerClient<P: MessagePort> {
    port: RpcClientPort<P>,
}

impl<P: MessagePort> TaskSchedulerClient<P> {
    /// Connects and binds, NDR64 first with DCE fallback.
    pub fn create() -> Result<Self> {
        Ok(Self {
            port: RpcClientPort::connect(&TASK_SCHEDULER_INTERFACE)?,
        })
    }

    /// The transfer syntax the binding negotiated.
    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.port.transfer_syntax()
    }

    /// `SchRpcRun` (opnum 12): starts the task registered at `path`.
    ///
    /// Returns the GUID of the created task instance and the server's
    /// HRESULT; inspecting that status is the caller's responsibility.
    pub fn run(
        &self,
        path: &str,
        args: &[&str],
        flags: u32,
        session_id: u32,
        user: Option<&str>,
    ) -> Result<(Guid, u32)> {
        // HRESULT SchRpcRun(
        //     [in, string] const wchar_t* path,
        //     [in] DWORD cArgs,
        //     [in, string, size_is(cArgs), unique] const wchar_t** pArgs,
        //     [in] DWORD flags,
        //     [in] DWORD sessionId,
        //     [in, unique, string] const wchar_t* user,
        //     [out] GUID* pGuid);
        let path = NdrWstring::from_str(path, true);
        let arg_count = NdrPrimitive::from(args.len() as u32);
        let arg_strings: NdrUniquePointer<ConformantArray<NdrWstring>> = if args.is_empty() {
            NdrUniquePointer::null()
        } else {
            NdrUniquePointer::new(ConformantArray::new(
                args.iter()
                    .map(|argument| NdrWstring::from_str(argument, true))
                    .collect(),
            ))
        };
        let flags = NdrPrimitive::from(flags);
        let session_id = NdrPrimitive::from(session_id);
        let user = unique_wstring(user, true);

        let mut input = MarshallBuffer::new(self.port.transfer_syntax());
        let mut output = MarshallBuffer::new(self.port.transfer_syntax());
        input
            .marshall(&path)
            .marshall(&arg_count)
            .marshall(&arg_strings)
            .marshall(&flags)
            .marshall(&session_id)
            .marshall(&user);

        self.port.call_procedure(12, &input, &mut output)?;

        let mut task_instance = NdrPrimitive::<Guid>::default();
        let mut result = NdrPrimitive::<u32>::default();
        output.unmarshall(&mut task_instance).unmarshall(&mut result);
        output.status()?;

        Ok((task_instance.value(), result.value()))
    }
}
