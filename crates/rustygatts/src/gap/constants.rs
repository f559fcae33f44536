// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

pub const BD_ADDR_LEN: usize = 6;

// Advertising interval (units of 0.625 ms)
pub const ADV_INTERVAL_MIN: u16 = 0x0020; // 20 ms
pub const ADV_INTERVAL_MAX: u16 = 0x0040; // 40 ms

// Connectable undirected advertising
pub const ADV_TYPE_IND: u8 = 0x00;

// All three advertising channels
pub const ADV_CHNL_ALL: u8 = 0x07;

// Scan and connect requests accepted from anyone
pub const ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY: u8 = 0x00;

// LE Connection parameters requested from a freshly connected peer
pub const LE_CONN_INTERVAL_MIN: u16 = 0x0030; // 60 ms
pub const LE_CONN_INTERVAL_MAX: u16 = 0x0050; // 100 ms
pub const LE_CONN_LATENCY: u16 = 0x0000;
pub const LE_SUPERVISION_TIMEOUT: u16 = 400; // 4000 ms

// Disconnect reason reported to handlers when a stale link record is dropped
pub const HCI_ERR_CONNECTION_TIMEOUT: u8 = 0x08;
