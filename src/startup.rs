use std::net::TcpListener;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::routes::{default_route, job_route, job_route::JobState};

pub fn run(listener: TcpListener, job_state: JobState) -> Result<Server, std::io::Error> {
    let job_state = web::Data::new(job_state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::health)
            .service(job_route::run_job)
            .app_data(job_state.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
