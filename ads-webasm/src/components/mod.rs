mod video_field;
pub use self::video_field::VideoField;

mod button;
pub use self::button::Button;

mod typed_input;
pub use self::typed_input::{TypedInput, TypedInputStorage};

mod ranged_value;
pub use self::ranged_value::RangedValue;

mod config_field;
pub use self::config_field::ConfigField;

#[cfg(feature = "csv-widget")]
mod csv_data_field;
#[cfg(feature = "csv-widget")]
pub use self::csv_data_field::{parse_csv, CsvData, CsvDataField, MaybeCsvData};

mod toggle;
pub use self::toggle::Toggle;

mod reload_button;
pub use self::reload_button::ReloadButton;

mod enum_toggle;
pub use self::enum_toggle::EnumToggle;

mod vec_toggle;
pub use self::vec_toggle::VecToggle;

mod recording_path;
pub use self::recording_path::RecordingPathWidget;

#[cfg(feature = "obj")]
pub mod obj_widget;

#[cfg(feature = "obj")]
pub use self::obj_widget::ObjWidget;
