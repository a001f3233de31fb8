use uuid::Uuid;

/**
 * How long (milliseconds) a scan may run before it is stopped without a match.
 */
pub const SCAN_TIMEOUT: u64 = 10_000;

/**
 * How long (milliseconds) connecting to the peripheral may take.
 */
pub const CONNECT_DEADLINE: u64 = 10_000;

/**
 * The advertised name of the glove firmware.
 */
pub const DEVICE_NAME: &str = "FakeGloveBLE";

/**
 * The UUID of the Bluetooth BLE service exposed by the glove (Nordic UART layout).
 */
pub const GLOVE_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/**
 * The UUID of the characteristic the glove notifies detected letters on.
 */
pub const GLOVE_LETTER_CHARACTERISTIC: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/**
 * Client characteristic configuration descriptor, written to enable notifications.
 */
pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/**
 * Value written to CLIENT_CHARACTERISTIC_CONFIG to enable notifications.
 */
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/**
 * Separates the letter from the optional JSON sensor payload inside one notification.
 * Example: `H:{"flex":[100,200,4000,4000,90]}`
 */
pub const PAYLOAD_SEPARATOR: char = ':';

/**
 * The range of raw flex values sent by the glove. 0 is a straight finger, FLEX_RANGE is fully bent.
 */
pub const FLEX_RANGE: u16 = 4095;

/**
 * The phrase a capture session expects to complete, one letter at a time.
 */
pub const TARGET_PHRASE: &str = "CHESTPAIN";

/**
 * How often (milliseconds) the placeholder sensor frame is refreshed while capturing.
 */
pub const REFRESH_INTERVAL: u64 = 50;

/**
 * Allowed range (milliseconds) for REFRESH_INTERVAL when configured; 20 Hz to 50 Hz.
 */
pub const REFRESH_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 20..=50;

/**
 * How long (milliseconds) the pulse flag stays raised after a letter was captured.
 */
pub const PULSE_DURATION: u64 = 300;
