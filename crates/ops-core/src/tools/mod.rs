mod docker_tools;
mod k8s_tools;
mod meta_tools;
mod ssh_tools;
mod util;

use crate::registry::{Registry, RegistryError};

/// Registers every tool in the §6.4 catalog. Startup fails if two
/// descriptors collide on name, which would otherwise silently shadow one
/// another in the registry's map.
pub fn build_registry() -> Result<Registry, RegistryError> {
    let builder = Registry::builder()
        .register(ssh_tools::ssh_execute())?
        .register(ssh_tools::query_logs())?
        .register(ssh_tools::system_info())?
        .register(ssh_tools::disk_usage())?
        .register(docker_tools::docker_list_containers())?
        .register(docker_tools::docker_logs())?
        .register(docker_tools::docker_start_container())?
        .register(docker_tools::docker_stop_container())?
        .register(docker_tools::docker_restart_container())?
        .register(k8s_tools::k8s_list_pods())?
        .register(k8s_tools::k8s_get_pod())?
        .register(k8s_tools::k8s_logs())?
        .register(k8s_tools::k8s_scale_deployment())?
        .register(k8s_tools::k8s_restart_deployment())?
        .register(meta_tools::profile_set())?
        .register(meta_tools::context_show())?;
    Ok(builder.build())
}
