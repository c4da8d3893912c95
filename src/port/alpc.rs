//! The ALPC implementation of the message-port capability.

use core::ptr;
use std::sync::{PoisonError, RwLock};

use log::{debug, warn};
use windows_sys::Win32::Foundation::{HANDLE, INVALID_HANDLE_VALUE, UNICODE_STRING};
use windows_sys::Win32::Security::{
    SECURITY_DYNAMIC_TRACKING, SECURITY_QUALITY_OF_SERVICE, SecurityImpersonation,
};

use crate::error::{AlpcRpcError, Result};

use super::ffi::{
    ALPC_DATA_VIEW_ATTR, ALPC_FLG_MSG_DATAVIEW_ATTR, ALPC_MESSAGE_ATTRIBUTES,
    ALPC_MSGFLG_RELEASE_MESSAGE, ALPC_MSGFLG_SYNC_REQUEST, ALPC_MSGVIEWATTR_RELEASE,
    ALPC_PORT_ATTRIBUTES, ALPC_PORTFLG_CAN_DUPLICATE_OBJECTS, ALPC_PORTFLG_CAN_IMPERSONATE,
    ALPC_PORTFLG_LPC_REQUESTS_ALLOWED, AlpcGetMessageAttribute, AlpcInitializeMessageAttribute,
    LPC_CONTINUATION_REQUIRED, NtAlpcConnectPort, NtAlpcDisconnectPort,
    NtAlpcSendWaitReceivePort, NtClose, PORT_MESSAGE,
};
use super::{MessagePort, PortReply};

/// Upper bound on a whole port message, header included.
pub const MAX_MESSAGE_SIZE: usize = 0x1000;

const PORT_HEADER_SIZE: usize = size_of::<PORT_MESSAGE>();

/// A connected ALPC port, specialised for RPC use: the connection
/// attributes allow impersonation and object duplication, the way the RPC
/// runtime's own ports are opened.
///
/// The handle sits behind a reader-writer guard: every send-receive takes
/// it shared, disconnection takes it exclusive and therefore waits out
/// in-flight exchanges.
pub struct AlpcPort {
    handle: RwLock<usize>,
    name: String,
}

impl AlpcPort {
    fn message_attributes_buffer(&self) -> Result<Vec<u8>> {
        // Ask the OS how much room any attribute set needs, then initialise
        // a buffer of that size. We never send attributes, but the server
        // may reply with them.
        let mut required = 0usize;
        let probe_status = unsafe {
            AlpcInitializeMessageAttribute(u32::MAX, ptr::null_mut(), 0, &mut required)
        };
        if required == 0 {
            return Err(AlpcRpcError::NtStatus(probe_status));
        }

        let mut buffer = vec![0u8; required];
        let status = unsafe {
            AlpcInitializeMessageAttribute(
                u32::MAX,
                buffer.as_mut_ptr().cast::<ALPC_MESSAGE_ATTRIBUTES>(),
                buffer.len(),
                &mut required,
            )
        };
        if status < 0 {
            return Err(AlpcRpcError::NtStatus(status));
        }
        Ok(buffer)
    }

    /// Best-effort copy of the reply's data-view payload. The view is
    /// flagged for release regardless, so the follow-up release message
    /// frees the server-side section.
    fn capture_view(&self, attributes: &mut [u8]) -> Option<Vec<u8>> {
        let header = unsafe { &*attributes.as_ptr().cast::<ALPC_MESSAGE_ATTRIBUTES>() };
        if header.ValidAttributes & ALPC_FLG_MSG_DATAVIEW_ATTR == 0 {
            return None;
        }

        let view = unsafe {
            AlpcGetMessageAttribute(
                attributes.as_mut_ptr().cast::<ALPC_MESSAGE_ATTRIBUTES>(),
                ALPC_FLG_MSG_DATAVIEW_ATTR,
            )
        }
        .cast::<ALPC_DATA_VIEW_ATTR>();
        if view.is_null() {
            return None;
        }

        unsafe {
            (*view).Flags |= ALPC_MSGVIEWATTR_RELEASE;
            if (*view).ViewBase.is_null() {
                return None;
            }
            let bytes =
                std::slice::from_raw_parts((*view).ViewBase.cast::<u8>(), (*view).ViewSize);
            Some(bytes.to_vec())
        }
    }
}

/// Frames `payload` behind a zeroed port-message header carrying the data
/// and total lengths.
fn build_port_message(payload: &[u8]) -> Result<Vec<u8>> {
    let total = PORT_HEADER_SIZE
        .checked_add(payload.len())
        .ok_or(AlpcRpcError::IntegerOverflow)?;
    if total > MAX_MESSAGE_SIZE {
        // DataLength and TotalLength are 16-bit wire fields.
        return Err(AlpcRpcError::IntegerOverflow);
    }

    let mut message = Vec::with_capacity(total);
    message.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    message.extend_from_slice(&(total as u16).to_le_bytes());
    message.resize(PORT_HEADER_SIZE, 0);
    message.extend_from_slice(payload);
    Ok(message)
}

impl MessagePort for AlpcPort {
    fn connect(port_name: &str) -> Result<Self> {
        let name_utf16: Vec<u16> = port_name.encode_utf16().collect();
        let byte_length = name_utf16
            .len()
            .checked_mul(2)
            .and_then(|bytes| u16::try_from(bytes).ok())
            .ok_or(AlpcRpcError::IntegerOverflow)?;
        let unicode_name = UNICODE_STRING {
            Length: byte_length,
            MaximumLength: byte_length,
            Buffer: name_utf16.as_ptr().cast_mut(),
        };

        let mut attributes: ALPC_PORT_ATTRIBUTES = unsafe { core::mem::zeroed() };
        attributes.Flags = ALPC_PORTFLG_CAN_IMPERSONATE
            | ALPC_PORTFLG_LPC_REQUESTS_ALLOWED
            | ALPC_PORTFLG_CAN_DUPLICATE_OBJECTS;
        attributes.MaxMessageLength = MAX_MESSAGE_SIZE;
        attributes.MaxPoolUsage = usize::MAX;
        attributes.MaxSectionSize = usize::MAX;
        attributes.MaxViewSize = usize::MAX;
        attributes.MaxTotalSectionSize = usize::MAX;
        attributes.DupObjectTypes = u32::MAX;
        attributes.SecurityQos = SECURITY_QUALITY_OF_SERVICE {
            Length: size_of::<SECURITY_QUALITY_OF_SERVICE>() as u32,
            ImpersonationLevel: SecurityImpersonation,
            ContextTrackingMode: SECURITY_DYNAMIC_TRACKING,
            EffectiveOnly: 0,
        };

        let mut handle: HANDLE = ptr::null_mut();
        let status = unsafe {
            NtAlpcConnectPort(
                &mut handle,
                &unicode_name,
                ptr::null(),
                &attributes,
                ALPC_MSGFLG_SYNC_REQUEST,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
            )
        };
        if status < 0 {
            return Err(AlpcRpcError::NtStatus(status));
        }
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            return Err(AlpcRpcError::InvalidHandle);
        }

        debug!("connected to port {port_name}");
        Ok(Self {
            handle: RwLock::new(handle as usize),
            name: port_name.to_owned(),
        })
    }

    fn send_receive(&self, input: &[u8]) -> Result<PortReply> {
        let guard = self
            .handle
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *guard == 0 {
            return Err(AlpcRpcError::PortDisconnected);
        }
        let handle = *guard as HANDLE;

        let send = build_port_message(input)?;
        let mut receive = vec![0u8; MAX_MESSAGE_SIZE];
        let mut attributes = self.message_attributes_buffer()?;

        let mut receive_length = receive.len();
        let status = unsafe {
            NtAlpcSendWaitReceivePort(
                handle,
                ALPC_MSGFLG_SYNC_REQUEST,
                send.as_ptr().cast::<PORT_MESSAGE>(),
                ptr::null_mut(),
                receive.as_mut_ptr().cast::<PORT_MESSAGE>(),
                &mut receive_length,
                attributes.as_mut_ptr().cast::<ALPC_MESSAGE_ATTRIBUTES>(),
                ptr::null(),
            )
        };
        if status < 0 {
            return Err(AlpcRpcError::NtStatus(status));
        }
        if receive_length < PORT_HEADER_SIZE {
            return Err(AlpcRpcError::BufferUnderflow);
        }

        let header = unsafe { ptr::read_unaligned(receive.as_ptr().cast::<PORT_MESSAGE>()) };

        // The payload sits DataInfoOffset bytes past the header.
        let data_offset = PORT_HEADER_SIZE + usize::from(header.DataInfoOffset);
        let data_end = data_offset
            .checked_add(usize::from(header.DataLength))
            .ok_or(AlpcRpcError::IntegerOverflow)?;
        if data_end > receive_length.min(receive.len()) {
            return Err(AlpcRpcError::BufferUnderflow);
        }
        let data = receive[data_offset..data_end].to_vec();

        let mut view = None;
        if header.Type & LPC_CONTINUATION_REQUIRED != 0 {
            // The server holds resources until the message is released.
            view = self.capture_view(&mut attributes);

            let mut release_length = receive_length;
            let release_status = unsafe {
                NtAlpcSendWaitReceivePort(
                    handle,
                    ALPC_MSGFLG_RELEASE_MESSAGE,
                    receive.as_ptr().cast::<PORT_MESSAGE>(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    &mut release_length,
                    ptr::null_mut(),
                    ptr::null(),
                )
            };
            if release_status < 0 {
                warn!(
                    "release message on port {} failed with NTSTATUS {release_status:#010x}",
                    self.name
                );
            }
        }

        Ok(PortReply { data, view })
    }

    fn disconnect(&self) {
        let mut guard = self
            .handle
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let handle = *guard;
        if handle == 0 {
            return;
        }

        unsafe {
            let status = NtAlpcDisconnectPort(handle as HANDLE, 0);
            if status < 0 {
                warn!(
                    "disconnect of port {} failed with NTSTATUS {status:#010x}",
                    self.name
                );
            }
            NtClose(handle as HANDLE);
        }
        *guard = 0;
        debug!("disconnected from port {}", self.name);
    }
}

impl Drop for AlpcPort {
    fn drop(&mut self) {
        self.disconnect();
    }
}
