//! ATT Protocol constants

// ATT error codes a request can be answered with
pub const ATT_ERROR_INVALID_HANDLE: u8 = 0x01;
pub const ATT_ERROR_READ_NOT_PERMITTED: u8 = 0x02;
pub const ATT_ERROR_WRITE_NOT_PERMITTED: u8 = 0x03;
pub const ATT_ERROR_INVALID_OFFSET: u8 = 0x07;
pub const ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH: u8 = 0x0D;

// Completion codes raised by the stack itself
pub const GATT_STACK_NO_RESOURCES: u8 = 0x80;
pub const GATT_STACK_INTERNAL_ERROR: u8 = 0x81;
pub const GATT_STACK_WRONG_STATE: u8 = 0x82;
pub const GATT_STACK_DB_FULL: u8 = 0x83;
pub const GATT_STACK_BUSY: u8 = 0x84;
pub const GATT_STACK_ERROR: u8 = 0x85;
pub const GATT_STACK_ILLEGAL_PARAMETER: u8 = 0x87;
pub const GATT_STACK_CONGESTED: u8 = 0x8f;

// ATT attribute permission flags
pub const ATT_PERM_READ: u16 = 0x0001;
pub const ATT_PERM_WRITE: u16 = 0x0002;
pub const ATT_PERM_READ_ENCRYPTED: u16 = 0x0004;
pub const ATT_PERM_WRITE_ENCRYPTED: u16 = 0x0008;
pub const ATT_PERM_READ_AUTHENTICATED: u16 = 0x0010;
pub const ATT_PERM_WRITE_AUTHENTICATED: u16 = 0x0020;
pub const ATT_PERM_READ_AUTHORIZED: u16 = 0x0040;
pub const ATT_PERM_WRITE_AUTHORIZED: u16 = 0x0080;

pub const ATT_DEFAULT_MTU: u16 = 23;

// Execute write flags
pub const ATT_EXEC_WRITE_CANCEL: u8 = 0x00;
pub const ATT_EXEC_WRITE_COMMIT: u8 = 0x01;

// Attribute types used to lay out a service table
pub const PRIMARY_SERVICE_UUID: u16 = 0x2800;
pub const SECONDARY_SERVICE_UUID: u16 = 0x2801;
pub const CHARACTERISTIC_UUID: u16 = 0x2803;
pub const CHAR_USER_DESC_UUID: u16 = 0x2901;
pub const CLIENT_CHAR_CONFIG_UUID: u16 = 0x2902;
