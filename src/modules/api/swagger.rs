use utoipa::OpenApi;

use crate::modules::device::DeviceEvent;

#[derive(OpenApi)]
#[openapi(
    nest( (path = "/api", api = super::MonitorApi) ),
    components(schemas(DeviceEvent)),
    tags( (name = "Landslide monitor API", description = "Live device state and commands") )
)]
pub struct MonitorDoc;
