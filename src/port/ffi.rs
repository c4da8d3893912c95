//! Hand-declared NT ALPC surface.
//!
//! No binding crate ships the ALPC system calls, so the entry points are
//! declared here against ntdll. Structure layouts follow the kernel
//! definitions for both pointer widths; the attribute-size quirk matters:
//! `AlpcInitializeMessageAttribute`'s required-size out-parameter is
//! pointer-sized on x64 even though older references declare it as a
//! 32-bit field.

#![allow(non_snake_case, non_camel_case_types, clippy::upper_case_acronyms)]

use core::ffi::c_void;

use windows_sys::Win32::Foundation::{HANDLE, NTSTATUS, UNICODE_STRING};
use windows_sys::Win32::Security::SECURITY_QUALITY_OF_SERVICE;

/// Synchronous connection request.
pub const ALPC_MSGFLG_SYNC_REQUEST: u32 = 0x0002_0000;
/// Signals the server it should free resources for the message.
pub const ALPC_MSGFLG_RELEASE_MESSAGE: u32 = 0x0001_0000;
/// Set in a reply's `Type` word when the server awaits a release.
pub const LPC_CONTINUATION_REQUIRED: u16 = 0x2000;
/// The message carries a data-view attribute.
pub const ALPC_FLG_MSG_DATAVIEW_ATTR: u32 = 0x4000_0000;
/// Marks a view attribute for release on the next exchange.
pub const ALPC_MSGVIEWATTR_RELEASE: u32 = 0x0001_0000;

/// Accept impersonation.
pub const ALPC_PORTFLG_CAN_IMPERSONATE: u32 = 0x0001_0000;
/// Allow LPC messages.
pub const ALPC_PORTFLG_LPC_REQUESTS_ALLOWED: u32 = 0x0002_0000;
/// Allow objects (e.g. handles) to be duplicated.
pub const ALPC_PORTFLG_CAN_DUPLICATE_OBJECTS: u32 = 0x0008_0000;

/// The fixed-size header every port message starts with. Only
/// `DataLength`, `TotalLength`, `Type` and `DataInfoOffset` are inspected
/// here; the client-id and auxiliary fields are platform-width filler.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PORT_MESSAGE {
    pub DataLength: u16,
    pub TotalLength: u16,
    pub Type: u16,
    pub DataInfoOffset: u16,
    pub ClientId: [usize; 2],
    pub MessageId: u32,
    pub ClientViewSize: usize,
}

#[repr(C)]
pub struct ALPC_PORT_ATTRIBUTES {
    pub Flags: u32,
    pub SecurityQos: SECURITY_QUALITY_OF_SERVICE,
    pub MaxMessageLength: usize,
    pub MemoryBandwidth: usize,
    pub MaxPoolUsage: usize,
    pub MaxSectionSize: usize,
    pub MaxViewSize: usize,
    pub MaxTotalSectionSize: usize,
    pub DupObjectTypes: u32,
    #[cfg(target_pointer_width = "64")]
    pub Reserved: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ALPC_MESSAGE_ATTRIBUTES {
    pub AllocatedAttributes: u32,
    pub ValidAttributes: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ALPC_DATA_VIEW_ATTR {
    pub Flags: u32,
    pub SectionHandle: HANDLE,
    pub ViewBase: *mut c_void,
    pub ViewSize: usize,
}

#[link(name = "ntdll")]
unsafe extern "system" {
    pub fn NtAlpcConnectPort(
        PortHandle: *mut HANDLE,
        PortName: *const UNICODE_STRING,
        ObjectAttributes: *const c_void,
        PortAttributes: *const ALPC_PORT_ATTRIBUTES,
        Flags: u32,
        RequiredServerSid: *const c_void,
        ConnectionMessage: *mut PORT_MESSAGE,
        BufferLength: *mut usize,
        OutMessageAttributes: *mut ALPC_MESSAGE_ATTRIBUTES,
        InMessageAttributes: *mut ALPC_MESSAGE_ATTRIBUTES,
        Timeout: *const i64,
    ) -> NTSTATUS;

    pub fn NtAlpcDisconnectPort(PortHandle: HANDLE, Flags: u32) -> NTSTATUS;

    pub fn NtAlpcSendWaitReceivePort(
        PortHandle: HANDLE,
        Flags: u32,
        SendMessage: *const PORT_MESSAGE,
        SendMessageAttributes: *mut ALPC_MESSAGE_ATTRIBUTES,
        ReceiveMessage: *mut PORT_MESSAGE,
        BufferLength: *mut usize,
        ReceiveMessageAttributes: *mut ALPC_MESSAGE_ATTRIBUTES,
        Timeout: *const i64,
    ) -> NTSTATUS;

    pub fn AlpcInitializeMessageAttribute(
        AttributeFlags: u32,
        Buffer: *mut ALPC_MESSAGE_ATTRIBUTES,
        BufferSize: usize,
        RequiredBufferSize: *mut usize,
    ) -> NTSTATUS;

    pub fn AlpcGetMessageAttribute(
        Buffer: *mut ALPC_MESSAGE_ATTRIBUTES,
        AttributeFlag: u32,
    ) -> *mut c_void;

    pub fn NtClose(Handle: HANDLE) -> NTSTATUS;
}
