//! POSIX error numbers carried in error replies
//!
//! Values follow the QNX Neutrino numbering, which is what clients of a
//! resource manager expect to see.

/// Success
pub const EOK: i32 = 0;
/// Operation not permitted
pub const EPERM: i32 = 1;
/// No such file or directory
pub const ENOENT: i32 = 2;
/// No such process
pub const ESRCH: i32 = 3;
/// Interrupted function call
pub const EINTR: i32 = 4;
/// Input/output error
pub const EIO: i32 = 5;
/// Bad file descriptor
pub const EBADF: i32 = 9;
/// Resource temporarily unavailable
pub const EAGAIN: i32 = 11;
/// Not enough memory
pub const ENOMEM: i32 = 12;
/// Permission denied
pub const EACCES: i32 = 13;
/// Bad address
pub const EFAULT: i32 = 14;
/// Resource busy
pub const EBUSY: i32 = 16;
/// File exists
pub const EEXIST: i32 = 17;
/// Invalid argument
pub const EINVAL: i32 = 22;
/// Inappropriate I/O control operation
pub const ENOTTY: i32 = 25;
/// Message too long
pub const EMSGSIZE: i32 = 90;
/// Function not implemented
pub const ENOSYS: i32 = 89;
/// Bad message
pub const EBADMSG: i32 = 77;
/// Operation canceled
pub const ECANCELED: i32 = 47;

/// Returns a short symbolic name for an errno value
pub fn name(errno: i32) -> &'static str {
    match errno {
        EOK => "EOK",
        EPERM => "EPERM",
        ENOENT => "ENOENT",
        ESRCH => "ESRCH",
        EINTR => "EINTR",
        EIO => "EIO",
        EBADF => "EBADF",
        EAGAIN => "EAGAIN",
        ENOMEM => "ENOMEM",
        EACCES => "EACCES",
        EFAULT => "EFAULT",
        EBUSY => "EBUSY",
        EEXIST => "EEXIST",
        EINVAL => "EINVAL",
        ENOTTY => "ENOTTY",
        EMSGSIZE => "EMSGSIZE",
        ENOSYS => "ENOSYS",
        EBADMSG => "EBADMSG",
        ECANCELED => "ECANCELED",
        _ => "E?",
    }
}
