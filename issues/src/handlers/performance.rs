use actix_web::{
    get,
    web::{self, Json},
};

use common::{
    context::Context,
    entities::performance::{PublicDepartmentPerformance, PublicStaffPerformance},
    error,
};

use crate::service::performance::PerformanceService;

#[get("/api/performance/departments")]
pub async fn get_department_performance(
    context: Context,
) -> error::Result<Json<Vec<PublicDepartmentPerformance>>> {
    Ok(Json(PerformanceService::new(context).departments().await?))
}

#[get("/api/performance/staff/{department_id}")]
pub async fn get_staff_performance(
    context: Context,
    department_id: web::Path<String>,
) -> error::Result<Json<Vec<PublicStaffPerformance>>> {
    Ok(Json(
        PerformanceService::new(context)
            .staff(department_id.parse()?)
            .await?,
    ))
}
