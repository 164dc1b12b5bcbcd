//! Host-app collaborators: screen navigation and device capabilities
//! (camera, photo library, share sheet).

pub mod device;
pub mod navigation;

pub use device::{
    pick_photo, post_share_message, Device, Permission, PermissionStatus, PhotoSource,
    PickerOptions, PickerOutcome, ShareContent, ShareOutcome,
};
pub use navigation::{open_author, open_stylist, Navigator, Route, StackNavigator};
