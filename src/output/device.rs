use crate::output::TableFormat;
use crate::types::{Device, DeviceWithPath};

impl TableFormat for Device {
    fn headers() -> Vec<&'static str> {
        vec!["DEVICE ID", "STATE"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.device_type.clone()]
    }
}

impl TableFormat for DeviceWithPath {
    fn headers() -> Vec<&'static str> {
        vec!["DEVICE ID", "STATE", "MODEL", "PRODUCT", "DEVICE", "TRANSPORT", "PATH"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.device_type.clone(),
            self.model.clone(),
            self.product.clone(),
            self.device.clone(),
            self.transport_id.clone(),
            self.path.clone(),
        ]
    }
}
