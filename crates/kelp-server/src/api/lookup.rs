//! Volume lookup over plain HTTP
//!
//! - GET|POST /dir/lookup?volumeId=3 or ?fileId=3,01637037d6

use actix_web::{HttpResponse, Responder, route, web};

use kelp_api::{LookupParam, LookupResult};
use kelp_core::FollowerServer;

#[route("/dir/lookup", method = "GET", method = "POST")]
pub async fn dir_lookup(
    data: web::Data<FollowerServer>,
    params: web::Query<LookupParam>,
) -> impl Responder {
    let Some(id) = params.volume_or_file_id() else {
        return HttpResponse::BadRequest()
            .json(LookupResult::failed("", "volumeId or fileId is required"));
    };

    match data.locate(&id) {
        Ok(locations) => HttpResponse::Ok().json(LookupResult::found(id, locations)),
        Err(e) if e.is_not_found() => HttpResponse::NotFound().json(LookupResult::failed(id, e)),
        Err(e) => HttpResponse::BadRequest().json(LookupResult::failed(id, e)),
    }
}
