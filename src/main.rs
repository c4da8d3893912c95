//! Interactive driver for the local RPC clients.
//!
//! One command per line; each command performs one connect/bind/call
//! cycle per procedure it needs and prints what the server answered.

fn main() {
    env_logger::init();

    #[cfg(windows)]
    driver::run();

    #[cfg(not(windows))]
    {
        eprintln!("alpc-rpc drives NT ALPC ports and only runs on Windows.");
        std::process::exit(1);
    }
}

#[cfg(windows)]
mod driver {
    use std::io::{self, BufRead, Write};

    use alpc_rpc::interfaces::firewall::{POLICY_ACCESS_RIGHT_READ_WRITE, STORE_TYPE_LOCAL};
    use alpc_rpc::interfaces::samr::USER_NORMAL_ACCOUNT;
    use alpc_rpc::interfaces::svcctl::ServiceDescription;
    use alpc_rpc::interfaces::{
        EventLogClient, FirewallClient, SamClient, ServiceControlClient, TaskSchedulerClient,
    };
    use alpc_rpc::port::AlpcPort;

    /// SchRpcRun flag: ignore the task's scheduling constraints.
    const TASK_RUN_IGNORE_CONSTRAINTS: u32 = 0x2;
    /// FW_SEVEN_BINARY_VERSION, the interface revision the store speaks.
    const FIREWALL_BINARY_VERSION: u16 = 0x020A;

    const MAXIMUM_ALLOWED: u32 = 0x0200_0000;
    const SC_MANAGER_ALL_ACCESS: u32 = 0x000F_003F;
    const SERVICE_ALL_ACCESS: u32 = 0x000F_01FF;
    const SERVICE_KERNEL_DRIVER: u32 = 0x0000_0001;
    const SERVICE_DEMAND_START: u32 = 0x0000_0003;
    const SERVICE_ERROR_NORMAL: u32 = 0x0000_0001;

    pub fn run() {
        print_help();

        loop {
            let Some(command) = prompt("") else { break };
            match command.as_str() {
                command if command.eq_ignore_ascii_case("RunTask") => run_task(),
                command if command.eq_ignore_ascii_case("ClearEventLog") => clear_event_log(),
                command if command.eq_ignore_ascii_case("DeleteFwRules") => delete_fw_rules(),
                command if command.eq_ignore_ascii_case("CreateService") => create_service(),
                command if command.eq_ignore_ascii_case("CreateUser") => create_user(),
                command if command.eq_ignore_ascii_case("Help") => print_help(),
                command if command.eq_ignore_ascii_case("Exit") => break,
                "" => {}
                other => println!("[!] Unknown command {other}. Type Help for the command list."),
            }
        }
    }

    fn print_help() {
        println!("Available commands:");
        println!("   * RunTask       - Uses SchRpcRun() to run a task identified by its path.");
        println!("   * ClearEventLog - Uses EvtRpcClearLog() to clear the existing event logs.");
        println!("   * DeleteFwRules - Uses FWDeleteAllFirewallRules() to remove the firewall rules.");
        println!("   * CreateService - Uses RCreateServiceW() to create a kernel mode service.");
        println!("   * CreateUser    - Uses SamrCreateUser2InDomain() to create a new user.");
        println!("   * Help          - Prints this message.");
        println!("   * Exit          - Exits the current application.");
    }

    fn prompt(message: &str) -> Option<String> {
        if !message.is_empty() {
            println!("{message}");
        }
        io::stdout().flush().ok();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).unwrap_or(0) == 0 {
            return None;
        }
        Some(line.trim().to_owned())
    }

    fn run_task() {
        let Some(path) = prompt("Please input the task path to be run:") else {
            return;
        };
        println!("[*] Will attempt to run the task from path {path}.");

        let client = match TaskSchedulerClient::<AlpcPort>::create() {
            Ok(client) => client,
            Err(error) => {
                println!("[!] Failed to connect to the port: {error}.");
                return;
            }
        };
        println!(
            "[*] Connected to the port. Transfer syntax flags used: {}.",
            client.transfer_syntax().as_flags()
        );

        match client.run(&path, &[], TASK_RUN_IGNORE_CONSTRAINTS, 0, None) {
            Ok((instance, 0)) => {
                println!("[*] SchRpcRun succeeded. Ran task {path}. Instance {{{instance}}}.");
            }
            Ok((_, result)) => println!("[!] SchRpcRun returned hresult {result:#x}."),
            Err(error) => println!("[!] SchRpcRun failed: {error}."),
        }
    }

    fn clear_event_log() {
        let client = match EventLogClient::<AlpcPort>::create() {
            Ok(client) => client,
            Err(error) => {
                println!("[!] Failed to connect to the port: {error}.");
                return;
            }
        };
        println!(
            "[*] Connected to the port. Transfer syntax flags used: {}.",
            client.transfer_syntax().as_flags()
        );

        let mut control = match client.register_controllable_operation() {
            Ok((control, 0)) => control,
            Ok((_, status)) => {
                println!("[!] EvtRpcRegisterControllableOperation returned {status:#x}.");
                return;
            }
            Err(error) => {
                println!("[!] EvtRpcRegisterControllableOperation failed: {error}.");
                return;
            }
        };

        match client.get_channel_list() {
            Ok((channels, 0)) => {
                println!("[*] Retrieved a number of {} channels.", channels.len());
                for channel in &channels {
                    let _ = client.clear_log(control, channel, None, 0);
                }
                println!("[*] Removed event logs!");
            }
            Ok((_, status)) => println!("[!] EvtRpcGetChannelList returned {status:#x}."),
            Err(error) => println!("[!] EvtRpcGetChannelList failed: {error}."),
        }

        match client.close(&mut control) {
            Ok(0) => {}
            Ok(status) => println!("[!] EvtRpcClose returned {status:#x}."),
            Err(error) => println!("[!] EvtRpcClose failed: {error}."),
        }
    }

    fn delete_fw_rules() {
        let client = match FirewallClient::<AlpcPort>::create() {
            Ok(client) => client,
            Err(error) => {
                println!("[!] Failed to connect to the port: {error}.");
                return;
            }
        };
        println!(
            "[*] Connected to the port. Transfer syntax flags used: {}.",
            client.transfer_syntax().as_flags()
        );

        let mut store = match client.open_policy_store(
            FIREWALL_BINARY_VERSION,
            STORE_TYPE_LOCAL,
            POLICY_ACCESS_RIGHT_READ_WRITE,
            0,
        ) {
            Ok((store, 0)) => store,
            Ok((_, status)) => {
                println!("[!] FWOpenPolicyStore returned {status:#x}.");
                return;
            }
            Err(error) => {
                println!("[!] FWOpenPolicyStore failed: {error}.");
                return;
            }
        };

        match client.delete_all_firewall_rules(store) {
            Ok(0) => println!("[*] Successfully deleted firewall rules!"),
            Ok(status) => println!("[!] FWDeleteAllFirewallRules returned {status:#x}."),
            Err(error) => println!("[!] FWDeleteAllFirewallRules failed: {error}."),
        }

        match client.close_policy_store(&mut store) {
            Ok(0) => {}
            Ok(status) => println!("[!] FWClosePolicyStore returned {status:#x}."),
            Err(error) => println!("[!] FWClosePolicyStore failed: {error}."),
        }
    }

    fn create_service() {
        let Some(binary_path) = prompt("Please input the path of the service binary:") else {
            return;
        };
        let Some(service_name) = prompt("Please input the service name:") else {
            return;
        };

        let client = match ServiceControlClient::<AlpcPort>::create() {
            Ok(client) => client,
            Err(error) => {
                println!("[!] Failed to connect to the port: {error}.");
                return;
            }
        };
        println!(
            "[*] Connected to the port. Transfer syntax flags used: {}.",
            client.transfer_syntax().as_flags()
        );

        let machine_name = std::env::var("COMPUTERNAME").ok();
        let mut manager =
            match client.open_sc_manager(machine_name.as_deref(), None, SC_MANAGER_ALL_ACCESS) {
                Ok((manager, 0)) => manager,
                Ok((_, status)) => {
                    println!("[!] ROpenSCManagerW returned {status:#x}.");
                    return;
                }
                Err(error) => {
                    println!("[!] ROpenSCManagerW failed: {error}.");
                    return;
                }
            };

        let description = ServiceDescription {
            service_name: &service_name,
            display_name: Some(&service_name),
            desired_access: SERVICE_ALL_ACCESS,
            service_type: SERVICE_KERNEL_DRIVER,
            start_type: SERVICE_DEMAND_START,
            error_control: SERVICE_ERROR_NORMAL,
            binary_path: &binary_path,
            ..Default::default()
        };
        match client.create_service(manager, &description) {
            Ok((_, mut service, 0)) => {
                println!("[*] Created service {service_name} from {binary_path}.");
                let _ = client.close_service_handle(&mut service);
            }
            Ok((_, _, status)) => println!("[!] RCreateServiceW returned {status:#x}."),
            Err(error) => println!("[!] RCreateServiceW failed: {error}."),
        }

        let _ = client.close_service_handle(&mut manager);
    }

    fn create_user() {
        let Some(user_name) = prompt("Please input the user name to be created:") else {
            return;
        };
        println!("[*] Will attempt to create the user with name {user_name}.");

        let client = match SamClient::<AlpcPort>::create() {
            Ok(client) => client,
            Err(error) => {
                println!("[!] Failed to connect to the port: {error}.");
                return;
            }
        };
        println!(
            "[*] Connected to the port. Transfer syntax flags used: {}.",
            client.transfer_syntax().as_flags()
        );

        let Ok(local_domain) = std::env::var("COMPUTERNAME") else {
            println!("[!] Failed to retrieve the computer name.");
            return;
        };
        println!("[*] Retrieved local domain name: {local_domain}.");

        let mut server = match client.connect_server(None, MAXIMUM_ALLOWED) {
            Ok((server, 0)) => server,
            Ok((_, status)) => {
                println!("[!] SamrConnect returned {status:#x}.");
                return;
            }
            Err(error) => {
                println!("[!] SamrConnect failed: {error}.");
                return;
            }
        };

        let domain_sid = match client.lookup_domain(server, &local_domain) {
            Ok((Some(sid), 0)) => sid,
            Ok((_, status)) => {
                println!("[!] SamrLookupDomainInSamServer returned {status:#x}.");
                let _ = client.close_handle(&mut server);
                return;
            }
            Err(error) => {
                println!("[!] SamrLookupDomainInSamServer failed: {error}.");
                let _ = client.close_handle(&mut server);
                return;
            }
        };

        let mut domain = match client.open_domain(server, MAXIMUM_ALLOWED, &domain_sid) {
            Ok((domain, 0)) => domain,
            Ok((_, status)) => {
                println!("[!] SamrOpenDomain returned {status:#x}.");
                let _ = client.close_handle(&mut server);
                return;
            }
            Err(error) => {
                println!("[!] SamrOpenDomain failed: {error}.");
                let _ = client.close_handle(&mut server);
                return;
            }
        };

        match client.create_user_in_domain(domain, &user_name, USER_NORMAL_ACCOUNT, MAXIMUM_ALLOWED)
        {
            Ok((mut user, _, relative_id, 0)) => {
                println!("[*] Created user {user_name} with RID {relative_id}.");
                let _ = client.close_handle(&mut user);
            }
            Ok((_, _, _, status)) => println!("[!] SamrCreateUser2InDomain returned {status:#x}."),
            Err(error) => println!("[!] SamrCreateUser2InDomain failed: {error}."),
        }

        let _ = client.close_handle(&mut domain);
        let _ = client.close_handle(&mut server);
    }
}
