/*!
 * Save, load, browse and share operations
 *
 * Each operation is a single pass against the connection's object store.
 * None of them retry; failures surface to the calling node as-is.
 */

pub mod browse;
pub mod load;
pub mod save;

pub use browse::{format_listing, list_objects, share_url, ObjectSummary, MAX_LIST_RESULTS, MAX_SHARE_HOURS};
pub use load::{decode_image, fingerprint, load_bytes, load_image, object_key, ImageTensor, LoadedImage};
pub use save::{build_key, save_batch, save_bytes, save_media, MediaFormat, SaveReceipt, BATCH_PLACEHOLDER};
